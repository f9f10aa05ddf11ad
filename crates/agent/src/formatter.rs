use std::sync::Arc;

use guestline_core::domain::event::format_start;
use tracing::{debug, warn};

use crate::dispatcher::{ActionOutcome, Dispatched};
use crate::intent::ModelFailure;
use crate::llm::{LlmClient, LlmRequest};
use crate::prompts::Prompts;

const FORMAT_TEMPERATURE: f32 = 0.2;

/// Shapes a successful action outcome into a readable draft.
pub struct ResponseFormatter {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<Prompts>,
}

impl ResponseFormatter {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<Prompts>) -> Self {
        Self { llm, prompts }
    }

    /// Never fails: any model problem degrades to [`fallback_dump`].
    pub async fn format(&self, dispatched: &Dispatched, correlation_id: &str) -> String {
        match self.format_with_model(dispatched).await {
            Ok(text) => text,
            Err(reason) => {
                warn!(
                    event_name = "agent.format.fallback",
                    correlation_id,
                    reason = %reason,
                    "formatter degraded to raw data dump"
                );
                fallback_dump(&dispatched.outcome)
            }
        }
    }

    async fn format_with_model(&self, dispatched: &Dispatched) -> Result<String, String> {
        let data = serde_json::to_string_pretty(&dispatched.outcome)
            .map_err(|error| format!("outcome serialization failed: {error}"))?;
        let prompt = self
            .prompts
            .format(&dispatched.request.describe(), &data)
            .map_err(|error| error.to_string())?;

        let completion = self
            .llm
            .generate(&LlmRequest::new(prompt, FORMAT_TEMPERATURE))
            .await
            .map_err(|error| error.to_string())?;
        if let Some(failure) = ModelFailure::from_completion(&completion) {
            return Err(format!("model output unusable: {}", failure.class()));
        }

        let text = completion.usable_text().unwrap_or_default().trim().to_string();
        debug!(event_name = "agent.format.completed", chars = text.len(), "draft formatted");
        Ok(text)
    }
}

/// Deterministic rendering of the raw outcome, used when the model can't be.
pub fn fallback_dump(outcome: &ActionOutcome) -> String {
    match outcome {
        ActionOutcome::Guests { event_id, status_filter, guests, has_more } => {
            let filter = status_filter
                .as_ref()
                .map(|status| format!(" (filter: {status})"))
                .unwrap_or_default();
            if guests.is_empty() {
                return format!("No guests found for event {event_id}{filter}.");
            }

            let mut lines = vec![format!(
                "Guests for event {event_id}{filter}: {} found.",
                guests.len()
            )];
            lines.extend(guests.iter().enumerate().map(|(index, guest)| {
                format!(
                    "{}. {} <{}> - {}",
                    index + 1,
                    guest.display_name(),
                    guest.email,
                    guest.status
                )
            }));
            if *has_more {
                lines.push("More guests exist beyond this page.".to_string());
            }
            lines.join("\n")
        }
        ActionOutcome::Event(detail) => {
            let mut lines = vec![
                format!("Event: {} (id: {})", detail.name, detail.id),
                format!("Starts: {}", format_start(detail.start_at)),
            ];
            if detail.end_at.is_some() {
                lines.push(format!("Ends: {}", format_start(detail.end_at)));
            }
            if let Some(location) = &detail.location {
                lines.push(format!("Location: {location}"));
            }
            if let Some(url) = &detail.url {
                lines.push(format!("Link: {url}"));
            }
            lines.join("\n")
        }
        ActionOutcome::GuestStatusUpdated { event_id, guest_email, new_status } => {
            format!("Guest {guest_email} is now {new_status} for event {event_id}.")
        }
    }
}
