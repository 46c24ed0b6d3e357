//! Candidate project records and CSV ingestion
//!
//! This module handles:
//! - The normalized `Project` record the scoring core works on
//! - Loading records from the scraper's CSV export
//! - Normalizing currency strings ("$12,500", "N/A") into plain amounts

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;

use crate::error::IngestError;

// Currency symbols, thousands separators and whitespace that may surround an amount.
static CURRENCY_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s,$€£¥]").expect("static currency pattern"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub title: String,
    pub goal: f64,
    pub raised: f64,
    pub summary: String,
    pub comments: String,
    /// Raw goal text when the source carried a non-numeric placeholder instead of an amount.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_note: Option<String>,
}

impl Project {
    pub fn new(
        title: impl Into<String>,
        goal: f64,
        raised: f64,
        summary: impl Into<String>,
    ) -> Self {
        Project {
            title: title.into(),
            goal: sanitize_amount(goal),
            raised: sanitize_amount(raised),
            summary: summary.into(),
            comments: String::new(),
            goal_note: None,
        }
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = comments.into();
        self
    }

    pub fn with_goal_note(mut self, note: impl Into<String>) -> Self {
        self.goal_note = Some(note.into());
        self
    }

    /// raised / goal, undefined when there is no goal.
    pub fn funding_ratio(&self) -> Option<f64> {
        if self.goal > 0.0 {
            Some(self.raised / self.goal)
        } else {
            None
        }
    }

    fn from_row(row: ProjectRow) -> Self {
        let goal = parse_currency(&row.goal);
        let raised = parse_currency(&row.raised);

        let goal_note = match goal {
            None if !row.goal.trim().is_empty() => Some(row.goal.trim().to_string()),
            _ => None,
        };
        if goal.is_none() || raised.is_none() {
            tracing::debug!(
                title = %row.title,
                goal = %row.goal,
                raised = %row.raised,
                "unparsable funding field defaulted to zero"
            );
        }

        Project {
            title: row.title,
            goal: goal.unwrap_or(0.0),
            raised: raised.unwrap_or(0.0),
            summary: row.summary,
            comments: row.comments,
            goal_note,
        }
    }
}

/// One row of the scraper export. Funding columns arrive as display strings.
#[derive(Debug, Deserialize)]
struct ProjectRow {
    #[serde(rename = "Project Title")]
    title: String,
    #[serde(rename = "Funding Raised", default)]
    raised: String,
    #[serde(rename = "Funding Goal", default)]
    goal: String,
    #[serde(rename = "Project Summary", default)]
    summary: String,
    #[serde(rename = "Project Comments", default)]
    comments: String,
}

/// Parse a display amount such as "$1,250,000.50".
///
/// "N/A" and blank cells mean "no funding data" and map to `Some(0.0)`.
/// Anything else that is not a non-negative finite number returns `None`.
pub fn parse_currency(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("n/a") {
        return Some(0.0);
    }

    CURRENCY_NOISE
        .replace_all(trimmed, "")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
}

fn sanitize_amount(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Cells are decoded lossily, so a stray non-UTF-8 byte in a funding column
/// only spoils that amount. Rows that still fail to deserialize are skipped.
pub fn read_projects<R: Read>(reader: R) -> Result<Vec<Project>, IngestError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(reader);

    let headers = lossy_record(csv_reader.byte_headers()?);
    let mut projects = Vec::new();
    for (index, record) in csv_reader.byte_records().enumerate() {
        let record = lossy_record(&record?);
        match record.deserialize::<ProjectRow>(Some(&headers)) {
            Ok(row) => projects.push(Project::from_row(row)),
            Err(err) => tracing::warn!(row = index + 1, error = %err, "skipping malformed record"),
        }
    }
    Ok(projects)
}

fn lossy_record(record: &csv::ByteRecord) -> csv::StringRecord {
    record
        .iter()
        .map(String::from_utf8_lossy)
        .collect::<csv::StringRecord>()
}

pub fn load_projects(path: &str) -> Result<Vec<Project>, IngestError> {
    let contents = fs::read(path).map_err(|source| IngestError::Io {
        path: path.to_string(),
        source,
    })?;
    let projects = read_projects(contents.as_slice())?;
    tracing::info!(path, count = projects.len(), "loaded project records");
    Ok(projects)
}
