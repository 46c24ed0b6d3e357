#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use fund_alloc::analyst::{NarrativeRequest, TextAnalyst};
use fund_alloc::error::ServiceError;
use fund_alloc::retry::RetryPolicy;

/// In-memory collaborator. Impact answers are scripted per summary; anything
/// unscripted gets `default_impact`.
pub struct ScriptedAnalyst {
    default_impact: String,
    scripted: Mutex<HashMap<String, VecDeque<Result<String, ServiceError>>>>,
    narrative: Option<String>,
    impact_calls: AtomicU32,
    narrative_calls: AtomicU32,
}

impl ScriptedAnalyst {
    pub fn answering(default_impact: &str) -> Self {
        ScriptedAnalyst {
            default_impact: default_impact.to_string(),
            scripted: Mutex::new(HashMap::new()),
            narrative: None,
            impact_calls: AtomicU32::new(0),
            narrative_calls: AtomicU32::new(0),
        }
    }

    pub fn with_narrative(mut self, text: &str) -> Self {
        self.narrative = Some(text.to_string());
        self
    }

    pub fn script(self, summary: &str, responses: Vec<Result<String, ServiceError>>) -> Self {
        self.scripted
            .lock()
            .expect("script mutex poisoned")
            .insert(summary.to_string(), responses.into());
        self
    }

    pub fn impact_calls(&self) -> u32 {
        self.impact_calls.load(Ordering::SeqCst)
    }

    pub fn narrative_calls(&self) -> u32 {
        self.narrative_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextAnalyst for ScriptedAnalyst {
    async fn assess_impact(&self, summary: &str, _comments: &str) -> Result<String, ServiceError> {
        self.impact_calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .scripted
            .lock()
            .expect("script mutex poisoned")
            .get_mut(summary)
            .and_then(|queue| queue.pop_front());
        next.unwrap_or_else(|| Ok(self.default_impact.clone()))
    }

    async fn describe(&self, request: &NarrativeRequest) -> Result<String, ServiceError> {
        self.narrative_calls.fetch_add(1, Ordering::SeqCst);
        match &self.narrative {
            Some(text) => Ok(format!("{} for {}", text, request.title)),
            None => Err(ServiceError::InvalidRequest("narratives disabled".into())),
        }
    }
}

pub fn rate_limited(wait_hint: &str) -> ServiceError {
    ServiceError::RateLimited {
        retry_after: None,
        message: format!("Rate limit reached. Please try again in {wait_hint}. Visit the docs."),
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 4,
        default_wait: Duration::from_millis(1),
        max_wait: Duration::from_secs(1),
    }
}
