use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;
use crate::telemetry::TelemetryError;

/// Failures reported by the remote text collaborator.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service asked us to slow down. The only retryable variant.
    #[error("rate limited: {message}")]
    RateLimited {
        retry_after: Option<Duration>,
        message: String,
    },

    /// The request was rejected as invalid or unsupported.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<ServiceError> },

    #[error("suggested wait of {requested:?} exceeds the {limit:?} limit")]
    WaitTooLong { requested: Duration, limit: Duration },
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::RateLimited { .. })
    }
}

/// Failures of the allocation linear program.
#[derive(Debug, Error, PartialEq)]
pub enum OptimizeError {
    #[error("allocation problem is infeasible for budget {budget}")]
    Infeasible { budget: f64 },

    #[error("invalid optimizer input: {0}")]
    InvalidInput(String),

    #[error("simplex did not converge within the iteration limit")]
    IterationLimit,
}

/// Failures while reading project records.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed project CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Top-level error for the command line entry point.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("optimization error: {0}")]
    Optimize(#[from] OptimizeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("collaborator error: {0}")]
    Service(#[from] ServiceError),
}
