use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::project::Project;

// Goal-size thresholds (currency units)
const LARGE_GOAL: f64 = 100_000.0;
const MEDIUM_GOAL: f64 = 50_000.0;
const SCALABLE_GOAL: f64 = 10_000.0;

// Traction thresholds on raised / goal
const HIGH_TRACTION_RATIO: f64 = 0.8;
const LOW_TRACTION_RATIO: f64 = 0.5;
const SCANT_EVIDENCE_RATIO: f64 = 0.2;

const SCANT_UNCERTAINTY: f64 = 10.0;
const BASE_UNCERTAINTY: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskTolerance {
    /// Multiplier applied to base uncertainty.
    pub fn uncertainty_factor(self) -> f64 {
        match self {
            RiskTolerance::High => 0.5, // risk-tolerant allocators discount uncertainty
            RiskTolerance::Low => 1.5,
            RiskTolerance::Medium => 1.0,
        }
    }
}

impl FromStr for RiskTolerance {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskTolerance::Low),
            "medium" => Ok(RiskTolerance::Medium),
            "high" => Ok(RiskTolerance::High),
            other => Err(format!(
                "unknown risk tolerance '{other}' (expected low, medium or high)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeframePriority {
    #[default]
    NearTerm,
    LongTerm,
    Other,
}

impl TimeframePriority {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "near-term" | "near" => TimeframePriority::NearTerm,
            "long-term" | "long" => TimeframePriority::LongTerm,
            _ => TimeframePriority::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeographicScope {
    #[default]
    Global,
    National,
    Local,
    Other,
}

impl GeographicScope {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "global" => GeographicScope::Global,
            "national" => GeographicScope::National,
            "local" => GeographicScope::Local,
            _ => GeographicScope::Other,
        }
    }
}

/// Policy knobs for one scoring pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScorePolicy {
    pub risk_tolerance: RiskTolerance,
    pub timeframe_priority: TimeframePriority,
    pub geographic_scope: GeographicScope,
}

impl fmt::Display for ScorePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "risk={:?} timeframe={:?} scope={:?}",
            self.risk_tolerance, self.timeframe_priority, self.geographic_scope
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreResult {
    pub impact: f64,
    pub uncertainty: f64,
    pub scalability: f64,
}

/// Score a project under `policy`.
///
/// `impact_seed` is the qualitative signal from the text collaborator; every
/// other term is a pure function of the project and policy.
pub fn score(project: &Project, policy: &ScorePolicy, impact_seed: f64) -> ScoreResult {
    let mut impact = impact_seed;
    impact += goal_size_bonus(project.goal);
    impact += traction_adjustment(project);

    let uncertainty = base_uncertainty(project) * policy.risk_tolerance.uncertainty_factor();
    let scalability = scalability(project);

    impact += timeframe_adjustment(project.goal, policy.timeframe_priority);
    impact += scope_adjustment(policy.geographic_scope);

    ScoreResult {
        impact,
        uncertainty,
        scalability,
    }
}

pub fn goal_size_bonus(goal: f64) -> f64 {
    if goal > LARGE_GOAL {
        2.0
    } else if goal > MEDIUM_GOAL {
        1.0
    } else {
        0.0
    }
}

/// Reward high traction on a large ask, penalize low traction.
/// Both checks run against the same ratio.
pub fn traction_adjustment(project: &Project) -> f64 {
    let Some(ratio) = project.funding_ratio() else {
        return 0.0;
    };

    let mut adjustment = 0.0;
    if ratio >= HIGH_TRACTION_RATIO && project.goal > MEDIUM_GOAL {
        adjustment += 2.0;
    }
    if ratio < LOW_TRACTION_RATIO {
        adjustment -= 1.0;
    }
    adjustment
}

/// Scant funder confidence means more uncertainty. No goal means no ratio, so base.
pub fn base_uncertainty(project: &Project) -> f64 {
    match project.funding_ratio() {
        Some(ratio) if ratio < SCANT_EVIDENCE_RATIO => SCANT_UNCERTAINTY,
        _ => BASE_UNCERTAINTY,
    }
}

pub fn scalability(project: &Project) -> f64 {
    if project.goal > SCALABLE_GOAL {
        10.0
    } else {
        5.0
    }
}

pub fn timeframe_adjustment(goal: f64, priority: TimeframePriority) -> f64 {
    match priority {
        TimeframePriority::NearTerm => {
            if goal < MEDIUM_GOAL {
                10.0
            } else {
                7.0
            }
        }
        TimeframePriority::LongTerm => {
            if goal < MEDIUM_GOAL {
                5.0
            } else {
                10.0
            }
        }
        TimeframePriority::Other => 7.0,
    }
}

pub fn scope_adjustment(scope: GeographicScope) -> f64 {
    match scope {
        GeographicScope::Global => 10.0,
        GeographicScope::National => 7.0,
        GeographicScope::Local => 5.0,
        GeographicScope::Other => 6.0,
    }
}

/// Smaller asks are assumed to be more neglected.
pub fn score_neglectedness(project: &Project) -> f64 {
    if project.goal < MEDIUM_GOAL {
        10.0
    } else {
        5.0
    }
}

/// Smaller, narrower asks are assumed to be more tractable.
pub fn score_tractability(project: &Project) -> f64 {
    if project.goal < MEDIUM_GOAL {
        10.0
    } else {
        5.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(
        risk: RiskTolerance,
        timeframe: TimeframePriority,
        scope: GeographicScope,
    ) -> ScorePolicy {
        ScorePolicy {
            risk_tolerance: risk,
            timeframe_priority: timeframe,
            geographic_scope: scope,
        }
    }

    #[test]
    fn goal_bonus_thresholds_are_exclusive_below() {
        assert_eq!(goal_size_bonus(40_000.0), 0.0);
        assert_eq!(goal_size_bonus(50_000.0), 0.0);
        assert_eq!(goal_size_bonus(50_000.01), 1.0);
        assert_eq!(goal_size_bonus(60_000.0), 1.0);
        assert_eq!(goal_size_bonus(100_000.0), 1.0);
        assert_eq!(goal_size_bonus(100_000.01), 2.0);
    }

    #[test]
    fn scalability_stays_flat_across_the_bonus_step() {
        let small = Project::new("s", 40_000.0, 0.0, "");
        let larger = Project::new("l", 60_000.0, 0.0, "");
        assert_eq!(scalability(&small), 10.0);
        assert_eq!(scalability(&larger), 10.0);
        assert_eq!(scalability(&Project::new("t", 10_000.0, 0.0, "")), 5.0);
    }

    #[test]
    fn zero_goal_uses_base_uncertainty_and_no_traction_terms() {
        let project = Project::new("zero", 0.0, 0.0, "");
        assert_eq!(base_uncertainty(&project), 5.0);
        assert_eq!(traction_adjustment(&project), 0.0);

        let result = score(&project, &ScorePolicy::default(), 5.0);
        assert!(result.impact.is_finite());
        assert_eq!(result.uncertainty, 5.0);
    }

    #[test]
    fn scant_funding_raises_uncertainty_scaled_by_risk() {
        let project = Project::new("scant", 100_000.0, 10_000.0, "");
        let neutral = |risk| policy(risk, TimeframePriority::Other, GeographicScope::Other);
        let low = score(&project, &neutral(RiskTolerance::Low), 5.0);
        let high = score(&project, &neutral(RiskTolerance::High), 5.0);
        assert_eq!(low.uncertainty, 15.0);
        assert_eq!(high.uncertainty, 5.0);
    }

    #[test]
    fn traction_rewards_large_well_funded_asks() {
        let strong = Project::new("a", 200_000.0, 180_000.0, "");
        assert_eq!(traction_adjustment(&strong), 2.0);

        let strong_but_small = Project::new("b", 40_000.0, 39_000.0, "");
        assert_eq!(traction_adjustment(&strong_but_small), 0.0);

        let weak = Project::new("c", 40_000.0, 1_000.0, "");
        assert_eq!(traction_adjustment(&weak), -1.0);
    }

    #[test]
    fn full_score_accumulates_every_term() {
        let project = Project::new("a", 200_000.0, 180_000.0, "");
        let result = score(
            &project,
            &policy(RiskTolerance::Medium, TimeframePriority::NearTerm, GeographicScope::Global),
            6.0,
        );
        // 6 seed + 2 size + 2 traction + 7 near-term + 10 global
        assert_eq!(result.impact, 27.0);
        assert_eq!(result.uncertainty, 5.0);
        assert_eq!(result.scalability, 10.0);
    }

    #[test]
    fn timeframe_and_scope_tables() {
        assert_eq!(timeframe_adjustment(10_000.0, TimeframePriority::NearTerm), 10.0);
        assert_eq!(timeframe_adjustment(50_000.0, TimeframePriority::NearTerm), 7.0);
        assert_eq!(timeframe_adjustment(10_000.0, TimeframePriority::LongTerm), 5.0);
        assert_eq!(timeframe_adjustment(50_000.0, TimeframePriority::LongTerm), 10.0);
        assert_eq!(timeframe_adjustment(1.0, TimeframePriority::Other), 7.0);

        assert_eq!(scope_adjustment(GeographicScope::National), 7.0);
        assert_eq!(scope_adjustment(GeographicScope::Local), 5.0);
        assert_eq!(scope_adjustment(GeographicScope::parse("continental")), 6.0);
    }

    #[test]
    fn neglectedness_and_tractability_depend_only_on_goal() {
        for goal in [0.0, 49_999.99, 50_000.0, 1_000_000.0] {
            let a = Project::new("a", goal, 0.0, "vague");
            let b = Project::new("b", goal, goal, "detailed");
            let expected = if goal < 50_000.0 { 10.0 } else { 5.0 };
            assert_eq!(score_neglectedness(&a), expected);
            assert_eq!(score_neglectedness(&b), expected);
            assert_eq!(score_tractability(&a), expected);
            assert_eq!(score_tractability(&b), expected);
        }
    }

    #[test]
    fn policy_parsing() {
        assert_eq!("HIGH".parse::<RiskTolerance>(), Ok(RiskTolerance::High));
        assert!("reckless".parse::<RiskTolerance>().is_err());
        assert_eq!(TimeframePriority::parse("long_term"), TimeframePriority::LongTerm);
        assert_eq!(TimeframePriority::parse("someday"), TimeframePriority::Other);
    }
}
