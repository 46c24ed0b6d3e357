//! End-to-end allocation run.
//!
//! Records pass the integrity filter once, get one qualitative impact lookup
//! each (cached for the rest of the run), and can then be scored and allocated
//! under any number of policies without touching the collaborator again.

use chrono::Utc;
use rand::Rng;

use crate::analyst::{parse_impact_seed, NarrativeRequest, TextAnalyst, NEUTRAL_IMPACT_SEED};
use crate::error::{OptimizeError, ServiceError};
use crate::integrity::IntegrityFilter;
use crate::opportunity;
use crate::optimizer::{self, ProjectScores};
use crate::project::Project;
use crate::report::{AllocationDecision, AllocationReport, SkippedProject};
use crate::retry::RetryPolicy;
use crate::scoring::ScorePolicy;

/// Projects that survived preparation, each with its cached impact seed.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedProjects {
    pub projects: Vec<Project>,
    pub impact_seeds: Vec<f64>,
    pub flagged: Vec<String>,
    pub skipped: Vec<SkippedProject>,
}

impl PreparedProjects {
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Pure re-scoring under `policy` from the cached seeds.
    pub fn scores(&self, policy: &ScorePolicy) -> Vec<ProjectScores> {
        self.projects
            .iter()
            .zip(&self.impact_seeds)
            .map(|(project, seed)| ProjectScores::evaluate(project, policy, *seed))
            .collect()
    }
}

pub struct AllocationRun<'a> {
    analyst: &'a dyn TextAnalyst,
    retry: RetryPolicy,
    filter: IntegrityFilter,
    narratives: bool,
}

impl<'a> AllocationRun<'a> {
    pub fn new(analyst: &'a dyn TextAnalyst) -> Self {
        AllocationRun {
            analyst,
            retry: RetryPolicy::default(),
            filter: IntegrityFilter::default(),
            narratives: false,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_filter(mut self, filter: IntegrityFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_narratives(mut self, enabled: bool) -> Self {
        self.narratives = enabled;
        self
    }

    /// Ask the collaborator for a project's impact seed.
    ///
    /// Rate limits are retried per the policy. An answer that is not a number
    /// falls back to the neutral seed; a fatal service error is returned.
    pub async fn impact_seed(&self, project: &Project) -> Result<f64, ServiceError> {
        let text = self
            .retry
            .run(&project.title, || {
                self.analyst
                    .assess_impact(&project.summary, &project.comments)
            })
            .await?;

        Ok(parse_impact_seed(&text).unwrap_or_else(|| {
            tracing::warn!(
                title = %project.title,
                response = %text.trim(),
                "impact response is not a number, using neutral seed"
            );
            NEUTRAL_IMPACT_SEED
        }))
    }

    /// Filter every record once, then look up each surviving impact seed once.
    pub async fn prepare(&self, projects: Vec<Project>) -> PreparedProjects {
        let mut prepared = PreparedProjects {
            projects: Vec::with_capacity(projects.len()),
            impact_seeds: Vec::with_capacity(projects.len()),
            flagged: Vec::new(),
            skipped: Vec::new(),
        };

        for mut project in projects {
            if self.filter.apply(&mut project) {
                prepared.flagged.push(project.title.clone());
            }

            match self.impact_seed(&project).await {
                Ok(seed) => {
                    tracing::debug!(title = %project.title, seed, "impact seed cached");
                    prepared.projects.push(project);
                    prepared.impact_seeds.push(seed);
                }
                Err(err) => {
                    tracing::warn!(title = %project.title, error = %err, "skipping project");
                    prepared.skipped.push(SkippedProject {
                        title: project.title,
                        reason: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            scored = prepared.len(),
            flagged = prepared.flagged.len(),
            skipped = prepared.skipped.len(),
            "projects prepared"
        );
        prepared
    }

    /// Score, optimize and summarize. Does not call the collaborator.
    pub fn allocate<R: Rng>(
        &self,
        prepared: &PreparedProjects,
        policy: &ScorePolicy,
        budget: f64,
        rng: &mut R,
    ) -> Result<AllocationReport, OptimizeError> {
        let scores = prepared.scores(policy);
        let allocation = optimizer::optimize(&prepared.projects, &scores, budget)?;

        let decisions: Vec<AllocationDecision> = allocation
            .selected()
            .map(|(i, fraction)| {
                AllocationDecision::new(
                    prepared.projects[i].clone(),
                    fraction,
                    scores[i].score.impact,
                    scores[i].score.uncertainty,
                )
            })
            .collect();
        let total_cost: f64 = decisions.iter().map(|d| d.allocated_amount).sum();
        let opportunity_cost = opportunity::simulate(&decisions, budget, rng);

        tracing::info!(
            %policy,
            selected = decisions.len(),
            total_cost,
            budget,
            "allocation complete"
        );

        Ok(AllocationReport {
            generated_at: Utc::now(),
            policy: *policy,
            budget,
            decisions,
            total_cost,
            objective: allocation.objective,
            opportunity_cost,
            flagged: prepared.flagged.clone(),
            skipped: prepared.skipped.clone(),
        })
    }

    /// Attach descriptions to funded projects. Failures leave the narrative empty.
    pub async fn narrate(&self, report: &mut AllocationReport) {
        for decision in report.decisions.iter_mut() {
            let request = NarrativeRequest {
                title: decision.project.title.clone(),
                allocated_amount: decision.allocated_amount,
                impact: decision.impact,
                uncertainty: decision.uncertainty,
            };
            match self
                .retry
                .run(&request.title, || self.analyst.describe(&request))
                .await
            {
                Ok(text) => decision.narrative = Some(text.trim().to_string()),
                Err(err) => {
                    tracing::warn!(title = %request.title, error = %err, "narrative unavailable");
                }
            }
        }
    }

    pub async fn execute<R: Rng>(
        &self,
        projects: Vec<Project>,
        policy: &ScorePolicy,
        budget: f64,
        rng: &mut R,
    ) -> Result<AllocationReport, OptimizeError> {
        let prepared = self.prepare(projects).await;
        let mut report = self.allocate(&prepared, policy, budget, rng)?;
        if self.narratives {
            self.narrate(&mut report).await;
        }
        Ok(report)
    }
}
