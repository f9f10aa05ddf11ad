use std::sync::Arc;

use tracing::warn;

use crate::intent::ModelFailure;
use crate::llm::{LlmClient, LlmRequest};
use crate::prompts::Prompts;

const TONE_TEMPERATURE: f32 = 0.3;

/// Final pass that makes a draft short and chat-friendly.
pub struct ToneNormalizer {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<Prompts>,
}

impl ToneNormalizer {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<Prompts>) -> Self {
        Self { llm, prompts }
    }

    /// Returns the draft unchanged on any failure.
    pub async fn normalize(&self, draft: &str, correlation_id: &str) -> String {
        if draft.trim().is_empty() {
            return draft.to_string();
        }

        let prompt = match self.prompts.tone(draft) {
            Ok(prompt) => prompt,
            Err(error) => {
                warn!(
                    event_name = "agent.tone.skipped",
                    correlation_id,
                    error = %error,
                    "tone prompt could not be rendered"
                );
                return draft.to_string();
            }
        };

        match self.llm.generate(&LlmRequest::new(prompt, TONE_TEMPERATURE)).await {
            Ok(completion) => match ModelFailure::from_completion(&completion) {
                None => completion.usable_text().unwrap_or(draft).trim().to_string(),
                Some(failure) => {
                    warn!(
                        event_name = "agent.tone.skipped",
                        correlation_id,
                        failure = failure.class(),
                        "tone output unusable, keeping draft"
                    );
                    draft.to_string()
                }
            },
            Err(error) => {
                warn!(
                    event_name = "agent.tone.skipped",
                    correlation_id,
                    error = %error,
                    "tone model call failed, keeping draft"
                );
                draft.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::ToneNormalizer;
    use crate::llm::{FinishReason, LlmCompletion, LlmError};
    use crate::prompts::Prompts;
    use crate::testing::ScriptedLlm;

    fn normalizer(llm: ScriptedLlm) -> ToneNormalizer {
        ToneNormalizer::new(Arc::new(llm), Arc::new(Prompts::new().expect("prompts")))
    }

    #[tokio::test]
    async fn rewritten_text_replaces_draft() {
        let tone = normalizer(ScriptedLlm::texts(&["  Jane is approved for ETHDenver.  "]));
        let text = tone.normalize("**Update:** Jane Doe has been approved!", "turn-1").await;
        assert_eq!(text, "Jane is approved for ETHDenver.");
    }

    #[tokio::test]
    async fn any_failure_returns_draft_unchanged() {
        let tone = normalizer(ScriptedLlm::new(vec![
            Err(LlmError::InvalidResponse("boom".to_string())),
            Ok(LlmCompletion::stopped(FinishReason::MaxTokens)),
            Ok(LlmCompletion::text("   ")),
        ]));
        for _ in 0..3 {
            assert_eq!(tone.normalize("Draft stays.", "turn-1").await, "Draft stays.");
        }
    }
}
