//! Intent resolution
//!
//! One model call per turn decides between a direct answer, a single tool
//! call, and a clarification. The model's output is parsed in two steps
//! (JSON syntax, then structure) and anything that does not pass both is
//! treated as conversation.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::context::EventSnapshot;
use crate::llm::{FinishReason, LlmClient, LlmCompletion, LlmRequest};
use crate::prompts::Prompts;

const INTENT_TEMPERATURE: f32 = 0.1;

pub const SAFETY_APOLOGY: &str =
    "Sorry, I can't help with that request because it was blocked by the safety filter.";
pub const EMPTY_APOLOGY: &str =
    "Sorry, I didn't get a usable answer from the language model. Please try rephrasing.";
pub const UNAVAILABLE_APOLOGY: &str =
    "Sorry, the language model is unavailable right now. Please try again shortly.";

/// A raw, not yet validated tool call as emitted by the model or built from
/// a chat command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCall {
    pub tool: String,
    pub params: BTreeMap<String, String>,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into(), params: BTreeMap::new() }
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntentDecision {
    DirectAnswer { text: String },
    ToolCall(ToolCall),
    Clarification { prompt: String },
}

impl IntentDecision {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DirectAnswer { .. } => "direct_answer",
            Self::ToolCall(_) => "tool_call",
            Self::Clarification { .. } => "clarification",
        }
    }
}

/// Why the model produced nothing usable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelFailure {
    Empty,
    Safety,
    AbnormalStop(FinishReason),
    Unavailable,
}

impl ModelFailure {
    pub fn apology(&self) -> String {
        match self {
            Self::Empty => EMPTY_APOLOGY.to_string(),
            Self::Safety => SAFETY_APOLOGY.to_string(),
            Self::AbnormalStop(reason) => format!(
                "Sorry, the language model stopped unexpectedly ({}). Please try again.",
                reason.as_str()
            ),
            Self::Unavailable => UNAVAILABLE_APOLOGY.to_string(),
        }
    }

    pub fn class(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Safety => "safety",
            Self::AbnormalStop(_) => "abnormal_stop",
            Self::Unavailable => "unavailable",
        }
    }

    /// Classifies a completion that cannot be used as-is.
    pub fn from_completion(completion: &LlmCompletion) -> Option<Self> {
        if completion.block_reason.is_some() {
            return Some(Self::Safety);
        }
        match &completion.finish_reason {
            Some(FinishReason::Safety) => return Some(Self::Safety),
            Some(FinishReason::Stop) | None => {}
            Some(other) => return Some(Self::AbnormalStop(other.clone())),
        }
        match completion.usable_text() {
            Some(_) => None,
            None => Some(Self::Empty),
        }
    }
}

/// The decision for a turn. Model failures are already folded into a
/// `DirectAnswer` apology; `model_failure` says which one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedIntent {
    pub decision: IntentDecision,
    pub model_failure: Option<ModelFailure>,
}

impl ResolvedIntent {
    fn failed(failure: ModelFailure) -> Self {
        Self {
            decision: IntentDecision::DirectAnswer { text: failure.apology() },
            model_failure: Some(failure),
        }
    }
}

pub struct IntentResolver {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<Prompts>,
}

impl IntentResolver {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<Prompts>) -> Self {
        Self { llm, prompts }
    }

    pub async fn resolve(
        &self,
        user_text: &str,
        snapshot: &EventSnapshot,
        correlation_id: &str,
    ) -> ResolvedIntent {
        let event_lines = snapshot.context_lines();
        let prompt = match self.prompts.intent(user_text, &event_lines, snapshot.grounding_note()) {
            Ok(prompt) => prompt,
            Err(error) => {
                warn!(
                    event_name = "agent.intent.prompt_failed",
                    correlation_id,
                    error = %error,
                    "intent prompt could not be rendered"
                );
                return ResolvedIntent::failed(ModelFailure::Unavailable);
            }
        };

        let request = LlmRequest::new(prompt, INTENT_TEMPERATURE);
        let completion = match self.llm.generate(&request).await {
            Ok(completion) => completion,
            Err(error) => {
                warn!(
                    event_name = "agent.intent.model_failed",
                    correlation_id,
                    error = %error,
                    "intent model call failed"
                );
                return ResolvedIntent::failed(ModelFailure::Unavailable);
            }
        };

        if let Some(failure) = ModelFailure::from_completion(&completion) {
            warn!(
                event_name = "agent.intent.model_unusable",
                correlation_id,
                failure = failure.class(),
                block_reason = completion.block_reason.as_deref().unwrap_or("none"),
                "intent model output unusable"
            );
            return ResolvedIntent::failed(failure);
        }

        let raw = completion.usable_text().unwrap_or_default();
        let decision = classify(raw);
        info!(
            event_name = "agent.intent.resolved",
            correlation_id,
            decision = decision.kind(),
            "intent resolved"
        );
        ResolvedIntent { decision, model_failure: None }
    }
}

/// Maps raw model text onto a decision. Never fails: anything that is not a
/// well-formed tool call or clarification is a direct answer.
pub fn classify(raw: &str) -> IntentDecision {
    let trimmed = raw.trim();
    let direct = || IntentDecision::DirectAnswer { text: trimmed.to_string() };

    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(strip_code_fence(trimmed)) else {
        return direct();
    };

    let structured = match object.get("action").and_then(Value::as_str) {
        Some("TOOL_CALL") => tool_call_from(&object).map(IntentDecision::ToolCall),
        Some("CLARIFY") => object
            .get("prompt")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|prompt| !prompt.is_empty())
            .map(|prompt| IntentDecision::Clarification { prompt: prompt.to_string() }),
        _ => None,
    };
    structured.unwrap_or_else(direct)
}

fn tool_call_from(object: &Map<String, Value>) -> Option<ToolCall> {
    let tool = object.get("tool")?.as_str()?.trim();
    if tool.is_empty() {
        return None;
    }
    let raw_params = object.get("params")?.as_object()?;

    let mut params = BTreeMap::new();
    for (key, value) in raw_params {
        let value = match value {
            Value::String(text) => text.trim().to_string(),
            Value::Bool(flag) => flag.to_string(),
            Value::Number(number) => number.to_string(),
            Value::Null => continue,
            Value::Array(_) | Value::Object(_) => return None,
        };
        if !value.is_empty() {
            params.insert(key.clone(), value);
        }
    }

    Some(ToolCall { tool: tool.to_string(), params })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string (`json`) on the opening line.
    match body.split_once('\n') {
        Some((info, inner)) if !info.trim_start().starts_with('{') => inner.trim(),
        _ => body.trim(),
    }
}
