use std::time::Duration;

use async_trait::async_trait;
use guestline_core::config::LlmConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

const BASE_BACKOFF_MS: u64 = 250;

/// Why the model stopped producing output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    Safety,
    Recitation,
    Other(String),
}

impl FinishReason {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "STOP" => Self::Stop,
            "MAX_TOKENS" => Self::MaxTokens,
            "SAFETY" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => Self::Safety,
            "RECITATION" => Self::Recitation,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Stop => "stop",
            Self::MaxTokens => "max tokens reached",
            Self::Safety => "safety",
            Self::Recitation => "recitation",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LlmCompletion {
    pub text: Option<String>,
    pub finish_reason: Option<FinishReason>,
    pub block_reason: Option<String>,
}

impl LlmCompletion {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), finish_reason: Some(FinishReason::Stop), block_reason: None }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self { text: None, finish_reason: None, block_reason: Some(reason.into()) }
    }

    pub fn stopped(reason: FinishReason) -> Self {
        Self { text: None, finish_reason: Some(reason), block_reason: None }
    }

    /// Trimmed text, only when the model finished normally and was not blocked.
    pub fn usable_text(&self) -> Option<&str> {
        if self.block_reason.is_some() {
            return None;
        }
        match &self.finish_reason {
            None | Some(FinishReason::Stop) => {}
            Some(_) => return None,
        }
        self.text.as_deref().map(str::trim).filter(|text| !text.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LlmRequest {
    pub prompt: String,
    pub temperature: f32,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32) -> Self {
        Self { prompt: prompt.into(), temperature }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model api key is missing")]
    MissingApiKey,
    #[error("language model transport failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("language model returned http {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("language model response was invalid: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmCompletion, LlmError>;
}

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl From<&LlmConfig> for GeminiConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            retry_backoff_ms: BASE_BACKOFF_MS,
        }
    }
}

/// `generateContent` client for Gemini-style endpoints.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, LlmError> {
        if config.api_key.expose_secret().trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self { client, config })
    }

    fn generate_content_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/models/{}:generateContent", self.config.model)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.min(6);
        Duration::from_millis(self.config.retry_backoff_ms.saturating_mul(1_u64 << shift))
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmCompletion, LlmError> {
        let url = self.generate_content_url();
        let body = build_generate_content_body(request);
        let max_retries = self.config.max_retries;

        for attempt in 0..=max_retries {
            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", self.config.api_key.expose_secret())
                .header("x-guestline-retry-attempt", attempt.to_string())
                .json(&body)
                .send()
                .await;

            match response {
                Ok(response) => {
                    let status = response.status();
                    let raw = response.text().await?;
                    if status.is_success() {
                        debug!(
                            event_name = "agent.llm.completed",
                            model = %self.config.model,
                            attempt,
                            "language model call completed"
                        );
                        return parse_generate_content_response(&raw);
                    }

                    if attempt < max_retries && should_retry_status(status.as_u16()) {
                        warn!(
                            event_name = "agent.llm.retry",
                            model = %self.config.model,
                            attempt,
                            status = status.as_u16(),
                            "retrying language model call"
                        );
                        tokio::time::sleep(self.backoff(attempt)).await;
                        continue;
                    }

                    return Err(LlmError::HttpStatus { status: status.as_u16(), body: raw });
                }
                Err(error) => {
                    if attempt < max_retries && is_retryable_transport_error(&error) {
                        warn!(
                            event_name = "agent.llm.retry",
                            model = %self.config.model,
                            attempt,
                            error = %error,
                            "retrying language model call after transport error"
                        );
                        tokio::time::sleep(self.backoff(attempt)).await;
                        continue;
                    }
                    return Err(LlmError::Http(error));
                }
            }
        }

        Err(LlmError::InvalidResponse("request retry loop terminated unexpectedly".to_string()))
    }
}

fn should_retry_status(status: u16) -> bool {
    status == 408 || status == 429 || status >= 500
}

fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

fn build_generate_content_body(request: &LlmRequest) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{"text": request.prompt}]
        }],
        "generationConfig": {
            "temperature": request.temperature
        }
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

fn parse_generate_content_response(raw: &str) -> Result<LlmCompletion, LlmError> {
    let parsed: GenerateContentResponse = serde_json::from_str(raw)
        .map_err(|error| LlmError::InvalidResponse(format!("malformed json: {error}")))?;

    let block_reason = parsed.prompt_feedback.and_then(|feedback| feedback.block_reason);
    let candidate = parsed.candidates.and_then(|candidates| candidates.into_iter().next());

    let Some(candidate) = candidate else {
        return Ok(LlmCompletion { text: None, finish_reason: None, block_reason });
    };

    let text = candidate
        .content
        .and_then(|content| content.parts)
        .map(|parts| parts.into_iter().filter_map(|part| part.text).collect::<Vec<_>>().join(""))
        .filter(|text| !text.is_empty());

    Ok(LlmCompletion {
        text,
        finish_reason: candidate.finish_reason.as_deref().map(FinishReason::parse),
        block_reason,
    })
}
