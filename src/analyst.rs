use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::ServiceConfig;
use crate::error::ServiceError;

/// Seed used when the collaborator's answer is not a number.
pub const NEUTRAL_IMPACT_SEED: f64 = 5.0;

const IMPACT_SYSTEM_PROMPT: &str = "Analyze the impact potential of this project.";
const NARRATIVE_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const NARRATIVE_MAX_TOKENS: u32 = 150;
const NARRATIVE_TEMPERATURE: f64 = 0.7;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Inputs for a post-allocation project description.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeRequest {
    pub title: String,
    pub allocated_amount: f64,
    pub impact: f64,
    pub uncertainty: f64,
}

impl NarrativeRequest {
    pub fn prompt(&self) -> String {
        format!(
            "Generate a description for the project titled '{}' with an allocated amount of {}, \
             impact of {}, and uncertainty of {}.",
            self.title, self.allocated_amount, self.impact, self.uncertainty
        )
    }
}

/// Remote text collaborator. Both calls return the raw model text.
#[async_trait]
pub trait TextAnalyst: Send + Sync {
    async fn assess_impact(&self, summary: &str, comments: &str) -> Result<String, ServiceError>;

    async fn describe(&self, request: &NarrativeRequest) -> Result<String, ServiceError>;
}

/// Interpret the collaborator's impact answer as a number.
pub fn parse_impact_seed(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Read a `Retry-After` value, either delta-seconds or an HTTP-date.
///
/// Dates already in the past mean "retry now".
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).ok();
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

/// Offline stand-in: answers nothing numeric, so every project gets the neutral seed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeutralAnalyst;

#[async_trait]
impl TextAnalyst for NeutralAnalyst {
    async fn assess_impact(&self, _summary: &str, _comments: &str) -> Result<String, ServiceError> {
        Ok(NEUTRAL_IMPACT_SEED.to_string())
    }

    async fn describe(&self, _request: &NarrativeRequest) -> Result<String, ServiceError> {
        Ok(String::new())
    }
}

/// OpenAI-compatible chat completions client.
pub struct ChatClient {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl ChatClient {
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(ChatClient { client, config })
    }

    fn headers(&self) -> Result<HeaderMap, ServiceError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key)).map_err(
            |_| ServiceError::InvalidRequest("API key is not a valid header value".into()),
        )?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn send_chat(&self, body: &Value) -> Result<String, ServiceError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let resp = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_retry_after(v, Utc::now()));
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(classify_failure(status, retry_after, &text));
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| ServiceError::MalformedResponse(e.to_string()))?;
        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|content| content.to_string())
            .ok_or_else(|| {
                ServiceError::MalformedResponse("missing choices[0].message.content".into())
            })
    }
}

#[async_trait]
impl TextAnalyst for ChatClient {
    async fn assess_impact(&self, summary: &str, comments: &str) -> Result<String, ServiceError> {
        let body = json!({
            "model": self.config.impact_model,
            "messages": [
                { "role": "system", "content": IMPACT_SYSTEM_PROMPT },
                { "role": "user", "content": format!("Summary: {summary}\nComments: {comments}") },
            ],
        });
        self.send_chat(&body).await
    }

    async fn describe(&self, request: &NarrativeRequest) -> Result<String, ServiceError> {
        let body = json!({
            "model": self.config.narrative_model,
            "messages": [
                { "role": "system", "content": NARRATIVE_SYSTEM_PROMPT },
                { "role": "user", "content": request.prompt() },
            ],
            "max_tokens": NARRATIVE_MAX_TOKENS,
            "temperature": NARRATIVE_TEMPERATURE,
        });
        Ok(self.send_chat(&body).await?.trim().to_string())
    }
}

/// Map a non-success response onto the retryable / fatal split.
pub fn classify_failure(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> ServiceError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(|m| m.to_string()))
        .unwrap_or_else(|| body.to_string());

    match status {
        StatusCode::TOO_MANY_REQUESTS => ServiceError::RateLimited {
            retry_after,
            message,
        },
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
            ServiceError::InvalidRequest(message)
        }
        other => ServiceError::Api {
            status: other.as_u16(),
            message,
        },
    }
}
