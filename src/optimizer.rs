use serde::Serialize;

use crate::error::OptimizeError;
use crate::project::Project;
use crate::scoring::{self, ScorePolicy, ScoreResult};
use crate::simplex::{LinearProgram, SimplexError};

/// Fractions at or below this are treated as "not funded".
pub const SELECTION_EPS: f64 = 1e-9;
/// Slack allowed when checking the solved allocation against the budget.
pub const BUDGET_EPS: f64 = 1e-6;

/// Everything the objective needs to know about one project.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectScores {
    pub score: ScoreResult,
    pub neglectedness: f64,
    pub tractability: f64,
}

impl ProjectScores {
    pub fn evaluate(project: &Project, policy: &ScorePolicy, impact_seed: f64) -> Self {
        ProjectScores {
            score: scoring::score(project, policy, impact_seed),
            neglectedness: scoring::score_neglectedness(project),
            tractability: scoring::score_tractability(project),
        }
    }

    /// Part of this project's objective term that does not scale with its fraction.
    pub fn fixed_term(&self) -> f64 {
        -self.score.uncertainty + self.neglectedness + self.tractability
    }
}

/// Solved fractions, index-aligned with the projects passed to [`optimize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub fractions: Vec<f64>,
    /// Objective value including the fraction-independent terms.
    pub objective: f64,
}

impl Allocation {
    pub fn selected(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.fractions
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, fraction)| *fraction > SELECTION_EPS)
    }

    pub fn total_cost(&self, projects: &[Project]) -> f64 {
        projects
            .iter()
            .zip(&self.fractions)
            .map(|(p, f)| p.goal * f)
            .sum()
    }
}

/// Choose a funded fraction of each project's goal.
///
/// Objective: `sum(impact_i * x_i - uncertainty_i + neglectedness_i + tractability_i)`.
/// Only impact scales with `x_i`; the other terms are per-project constants.
/// Subject to `sum(goal_i * x_i) <= budget` and `0 <= x_i <= 1`.
pub fn optimize(
    projects: &[Project],
    scores: &[ProjectScores],
    budget: f64,
) -> Result<Allocation, OptimizeError> {
    if projects.len() != scores.len() {
        return Err(OptimizeError::InvalidInput(format!(
            "{} projects but {} score rows",
            projects.len(),
            scores.len()
        )));
    }
    if !budget.is_finite() {
        return Err(OptimizeError::InvalidInput(format!("budget {budget} is not finite")));
    }
    if budget < 0.0 {
        return Err(OptimizeError::Infeasible { budget });
    }

    let n = projects.len();
    if n == 0 {
        return Ok(Allocation {
            fractions: Vec::new(),
            objective: 0.0,
        });
    }

    let impacts: Vec<f64> = scores.iter().map(|s| s.score.impact).collect();
    let goals: Vec<f64> = projects.iter().map(|p| p.goal).collect();

    // One budget row; the per-project caps are variable bounds.
    let solution = LinearProgram::maximize(impacts)
        .less_or_equal(goals, budget)
        .with_upper_bounds(vec![1.0; n])
        .solve().map_err(|err| match err {
        SimplexError::Infeasible { .. } => OptimizeError::Infeasible { budget },
        SimplexError::IterationLimit(_) => OptimizeError::IterationLimit,
        other => OptimizeError::InvalidInput(other.to_string()),
    })?;

    let fractions: Vec<f64> = solution.values.iter().map(|x| x.clamp(0.0, 1.0)).collect();
    let fixed: f64 = scores.iter().map(ProjectScores::fixed_term).sum();
    let allocation = Allocation {
        fractions,
        objective: solution.objective + fixed,
    };

    let spent = allocation.total_cost(projects);
    if spent > budget + BUDGET_EPS * budget.max(1.0) {
        return Err(OptimizeError::InvalidInput(format!(
            "solver returned an allocation costing {spent:.2} over budget {budget:.2}"
        )));
    }

    tracing::debug!(
        projects = n,
        iterations = solution.iterations,
        objective = allocation.objective,
        spent,
        budget,
        "allocation solved"
    );
    Ok(allocation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(impact: f64, uncertainty: f64, goal: f64) -> ProjectScores {
        ProjectScores {
            score: ScoreResult {
                impact,
                uncertainty,
                scalability: 10.0,
            },
            neglectedness: if goal < 50_000.0 { 10.0 } else { 5.0 },
            tractability: if goal < 50_000.0 { 10.0 } else { 5.0 },
        }
    }

    #[test]
    fn zero_goal_projects_are_fully_funded() {
        let projects = vec![
            Project::new("free", 0.0, 0.0, ""),
            Project::new("big", 1_000_000.0, 0.0, ""),
        ];
        let rows = vec![scores(20.0, 5.0, 0.0), scores(20.0, 5.0, 1_000_000.0)];

        let allocation = optimize(&projects, &rows, 0.0).expect("feasible");
        assert!((allocation.fractions[0] - 1.0).abs() < 1e-9);
        assert!(allocation.fractions[1].abs() < 1e-9);
    }

    #[test]
    fn budget_is_respected_and_spent_on_best_ratio_first() {
        let projects = vec![
            Project::new("a", 200_000.0, 0.0, ""),
            Project::new("b", 30_000.0, 0.0, ""),
            Project::new("c", 80_000.0, 0.0, ""),
        ];
        let rows = vec![
            scores(27.0, 5.0, 200_000.0),
            scores(25.0, 10.0, 30_000.0),
            scores(10.0, 5.0, 80_000.0),
        ];

        let allocation = optimize(&projects, &rows, 100_000.0).expect("feasible");
        let spent = allocation.total_cost(&projects);
        assert!(spent <= 100_000.0 + 1e-6);

        // b has the best impact per unit of goal, then a (27/200k > 10/80k).
        assert!((allocation.fractions[1] - 1.0).abs() < 1e-9);
        assert!((allocation.fractions[0] - 0.35).abs() < 1e-9);
        assert!(allocation.fractions[2].abs() < 1e-9);
    }

    #[test]
    fn objective_includes_fixed_terms() {
        let projects = vec![Project::new("a", 10_000.0, 0.0, "")];
        let rows = vec![scores(4.0, 5.0, 10_000.0)];
        let allocation = optimize(&projects, &rows, 5_000.0).expect("feasible");
        assert!((allocation.fractions[0] - 0.5).abs() < 1e-9);
        // 4 * 0.5 - 5 + 10 + 10
        assert!((allocation.objective - 17.0).abs() < 1e-9);
    }

    #[test]
    fn negative_impact_is_never_funded() {
        let projects = vec![Project::new("a", 10_000.0, 0.0, "")];
        let rows = vec![scores(-3.0, 5.0, 10_000.0)];
        let allocation = optimize(&projects, &rows, 50_000.0).expect("feasible");
        assert_eq!(allocation.selected().count(), 0);
    }

    #[test]
    fn large_pools_match_the_ratio_greedy_optimum() {
        let n = 500;
        let projects: Vec<Project> = (0..n)
            .map(|i| {
                let goal = 1_000.0 + ((i * 37) % 500) as f64 * 100.0;
                Project::new(format!("p{i}"), goal, 0.0, "")
            })
            .collect();
        let rows: Vec<ProjectScores> = (0..n)
            .map(|i| scores(1.0 + ((i * 13) % 29) as f64, 5.0, projects[i].goal))
            .collect();
        let budget = 2_000_000.0;

        let allocation = optimize(&projects, &rows, budget).expect("feasible");
        assert!(allocation.total_cost(&projects) <= budget * (1.0 + 1e-9));
        assert!(allocation.fractions.iter().all(|f| (0.0..=1.0).contains(f)));

        // With one budget row the optimum is the fractional knapsack fill.
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            let ra = rows[a].score.impact / projects[a].goal;
            let rb = rows[b].score.impact / projects[b].goal;
            rb.total_cmp(&ra)
        });
        let mut left = budget;
        let mut best = 0.0;
        for i in order {
            let take = (left / projects[i].goal).min(1.0);
            best += rows[i].score.impact * take;
            left -= projects[i].goal * take;
            if left <= 0.0 {
                break;
            }
        }
        let fixed: f64 = rows.iter().map(ProjectScores::fixed_term).sum();
        let solved = allocation.objective - fixed;
        assert!((solved - best).abs() < 1e-6 * best, "{solved} vs {best}");
    }

    #[test]
    fn negative_budget_is_infeasible() {
        let projects = vec![Project::new("a", 10_000.0, 0.0, "")];
        let rows = vec![scores(4.0, 5.0, 10_000.0)];
        let err = optimize(&projects, &rows, -1.0).expect_err("negative budget");
        assert_eq!(err, OptimizeError::Infeasible { budget: -1.0 });
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        let projects = vec![Project::new("a", 10_000.0, 0.0, "")];
        let err = optimize(&projects, &[], 1.0).expect_err("missing scores");
        assert!(matches!(err, OptimizeError::InvalidInput(_)));
    }
}
