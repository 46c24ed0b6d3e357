use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryPolicy;
use crate::scoring::{GeographicScope, RiskTolerance, ScorePolicy, TimeframePriority};

pub const DEFAULT_BUDGET: f64 = 700_000.0;
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Top-level configuration for an allocation run.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub budget: f64,
    pub policy: ScorePolicy,
    pub telemetry: TelemetryConfig,
    /// `None` when no API key is configured; the run then uses neutral impact seeds.
    pub service: Option<ServiceConfig>,
    pub retry: RetryPolicy,
    pub seed: Option<u64>,
}

/// Connection settings for the OpenAI-compatible text collaborator.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub api_key: String,
    pub base_url: String,
    pub impact_model: String,
    pub narrative_model: String,
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a finite number, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be a non-negative integer, got '{value}'")]
    InvalidInteger { key: &'static str, value: String },

    #[error("{key}: {reason}")]
    InvalidPolicy { key: &'static str, reason: String },
}

impl AppConfig {
    /// Load from the process environment, reading `.env` first when present.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let budget = match lookup("FUND_ALLOC_BUDGET") {
            Some(raw) => parse_finite("FUND_ALLOC_BUDGET", &raw)?,
            None => DEFAULT_BUDGET,
        };

        let risk_tolerance = match lookup("FUND_ALLOC_RISK_TOLERANCE") {
            Some(raw) => raw
                .parse::<RiskTolerance>()
                .map_err(|reason| ConfigError::InvalidPolicy {
                    key: "FUND_ALLOC_RISK_TOLERANCE",
                    reason,
                })?,
            None => RiskTolerance::Medium,
        };
        let timeframe_priority = lookup("FUND_ALLOC_TIMEFRAME")
            .map(|raw| TimeframePriority::parse(&raw))
            .unwrap_or(TimeframePriority::NearTerm);
        let geographic_scope = lookup("FUND_ALLOC_SCOPE")
            .map(|raw| GeographicScope::parse(&raw))
            .unwrap_or(GeographicScope::Global);

        let log_level = lookup("FUND_ALLOC_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let service = lookup("OPENAI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .map(|api_key| ServiceConfig {
                api_key,
                base_url: lookup("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                impact_model: lookup("FUND_ALLOC_IMPACT_MODEL")
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                narrative_model: lookup("FUND_ALLOC_NARRATIVE_MODEL")
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            });

        let mut retry = RetryPolicy::default();
        if let Some(raw) = lookup("FUND_ALLOC_MAX_ATTEMPTS") {
            retry.max_attempts = parse_u32("FUND_ALLOC_MAX_ATTEMPTS", &raw)?.max(1);
        }
        if let Some(raw) = lookup("FUND_ALLOC_MAX_RETRY_WAIT_SECS") {
            let secs = parse_u64("FUND_ALLOC_MAX_RETRY_WAIT_SECS", &raw)?;
            retry.max_wait = Duration::from_secs(secs);
        }

        let seed = lookup("FUND_ALLOC_SEED")
            .map(|raw| parse_u64("FUND_ALLOC_SEED", &raw))
            .transpose()?;

        Ok(Self {
            budget,
            policy: ScorePolicy {
                risk_tolerance,
                timeframe_priority,
                geographic_scope,
            },
            telemetry: TelemetryConfig { log_level },
            service,
            retry,
            seed,
        })
    }
}

fn parse_finite(key: &'static str, raw: &str) -> Result<f64, ConfigError> {
    raw.trim()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        })
}

fn parse_u64(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidInteger {
            key,
            value: raw.to_string(),
        })
}

fn parse_u32(key: &'static str, raw: &str) -> Result<u32, ConfigError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidInteger {
            key,
            value: raw.to_string(),
        })
}
