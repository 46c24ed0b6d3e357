//! Retry policy for calls to the text collaborator.
//!
//! Only rate limiting is retried. The wait comes from the service itself:
//! a `Retry-After` header when it sent one, otherwise a "try again in 1.5s"
//! hint in the error message, otherwise `default_wait`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;
use std::time::Duration;

use crate::error::ServiceError;

static WAIT_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)try again in\s+(\d+(?:\.\d+)?)\s*(ms|s)\b").expect("static wait hint pattern")
});

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    /// Wait used when the service gives no hint.
    pub default_wait: Duration,
    /// Longest wait we are willing to honor before giving up.
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            default_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, fails fatally, or the policy is exhausted.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut attempt = 1;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => err,
                Err(err) => return Err(err),
            };

            if attempt >= self.max_attempts {
                return Err(ServiceError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let wait = suggested_wait(&err).unwrap_or(self.default_wait);
            if wait > self.max_wait {
                return Err(ServiceError::WaitTooLong {
                    requested: wait,
                    limit: self.max_wait,
                });
            }

            tracing::warn!(
                label,
                attempt,
                wait_ms = wait.as_millis() as u64,
                error = %err,
                "rate limited, waiting before retry"
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}

/// The wait the service asked for, if it said.
pub fn suggested_wait(err: &ServiceError) -> Option<Duration> {
    match err {
        ServiceError::RateLimited {
            retry_after: Some(wait),
            ..
        } => Some(*wait),
        ServiceError::RateLimited { message, .. } => parse_wait_hint(message),
        _ => None,
    }
}

pub fn parse_wait_hint(message: &str) -> Option<Duration> {
    let caps = WAIT_HINT.captures(message)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    let seconds = match caps.get(2)?.as_str().to_ascii_lowercase().as_str() {
        "ms" => amount / 1000.0,
        _ => amount,
    };
    Duration::try_from_secs_f64(seconds).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn rate_limited(message: &str) -> ServiceError {
        ServiceError::RateLimited {
            retry_after: None,
            message: message.to_string(),
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            default_wait: Duration::from_millis(1),
            max_wait: Duration::from_secs(1),
        }
    }

    #[test]
    fn wait_hint_parses_seconds_and_millis() {
        assert_eq!(
            parse_wait_hint("Rate limit reached. Please try again in 1.5s. Visit ..."),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(
            parse_wait_hint("Please try again in 120ms."),
            Some(Duration::from_millis(120))
        );
        assert_eq!(parse_wait_hint("slow down"), None);
    }

    #[test]
    fn header_wait_wins_over_message() {
        let err = ServiceError::RateLimited {
            retry_after: Some(Duration::from_secs(3)),
            message: "Please try again in 1s".to_string(),
        };
        assert_eq!(suggested_wait(&err), Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy()
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ServiceError::InvalidRequest("context too long".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(ServiceError::InvalidRequest(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy()
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(rate_limited("Please try again in 1ms")) }
            })
            .await;

        assert!(matches!(
            result,
            Err(ServiceError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn refuses_waits_beyond_the_limit() {
        let result: Result<(), _> = fast_policy()
            .run("test", || async { Err(rate_limited("Please try again in 90s")) })
            .await;
        assert!(matches!(result, Err(ServiceError::WaitTooLong { .. })));
    }

    #[tokio::test]
    async fn succeeds_after_transient_rate_limits() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(rate_limited("Please try again in 2ms"))
                    } else {
                        Ok("7")
                    }
                }
            })
            .await;

        assert_eq!(result.expect("third attempt succeeds"), "7");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
