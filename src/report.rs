use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;

use crate::error::AppError;
use crate::project::Project;
use crate::scoring::ScorePolicy;

/// One funded project. Only produced for fractions strictly above zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationDecision {
    pub project: Project,
    pub allocated_fraction: f64,
    pub allocated_amount: f64,
    pub impact: f64,
    pub uncertainty: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

impl AllocationDecision {
    pub fn new(project: Project, allocated_fraction: f64, impact: f64, uncertainty: f64) -> Self {
        let allocated_amount = allocated_fraction * project.goal;
        AllocationDecision {
            project,
            allocated_fraction,
            allocated_amount,
            impact,
            uncertainty,
            narrative: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedProject {
    pub title: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationReport {
    pub generated_at: DateTime<Utc>,
    pub policy: ScorePolicy,
    pub budget: f64,
    pub decisions: Vec<AllocationDecision>,
    pub total_cost: f64,
    pub objective: f64,
    pub opportunity_cost: f64,
    /// Titles of records the integrity filter flagged.
    pub flagged: Vec<String>,
    pub skipped: Vec<SkippedProject>,
}

impl AllocationReport {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Selected Projects:");
        for d in &self.decisions {
            let _ = writeln!(
                out,
                "Project: {}, Allocated Fraction: {:.2}, Allocated Amount: {}, Impact: {}, \
                 Uncertainty: {}",
                d.project.title,
                d.allocated_fraction,
                format_currency(d.allocated_amount),
                d.impact,
                d.uncertainty
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Total Allocated Cost: {}", format_currency(self.total_cost));
        let _ = writeln!(
            out,
            "Estimated Opportunity Cost: {}",
            format_currency(self.opportunity_cost)
        );

        for d in &self.decisions {
            let Some(narrative) = d.narrative.as_deref().filter(|n| !n.is_empty()) else {
                continue;
            };
            let _ = writeln!(out);
            let _ = writeln!(out, "Project: {}", d.project.title);
            let _ = writeln!(out, "Allocated Amount: {}", format_currency(d.allocated_amount));
            let _ = writeln!(out, "Impact: {}", d.impact);
            let _ = writeln!(out, "Uncertainty: {}", d.uncertainty);
            let _ = writeln!(out, "Qualitative Description: {narrative}");
        }

        if !self.skipped.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Skipped Projects:");
            for s in &self.skipped {
                let _ = writeln!(out, "  {}: {}", s.title, s.reason);
            }
        }
        out
    }

    pub fn write_json(&self, path: &str) -> Result<(), AppError> {
        let tmp_path = format!("{path}.tmp");
        fs::write(&tmp_path, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

/// "$1,234,567.89"
pub fn format_currency(amount: f64) -> String {
    let formatted = format!("{:.2}", amount.abs());
    let (whole, cents) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{cents}")
}
