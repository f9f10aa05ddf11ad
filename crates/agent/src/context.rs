//! Per-turn grounding: the organization's known events, fetched fresh.

use std::sync::Arc;

use guestline_core::domain::event::{EventDetail, EventRef};
use guestline_core::platform::{EventPlatform, PlatformError};
use guestline_core::reference::Grounding;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

/// Upper bound on concurrent detail fetches per turn.
pub const HYDRATION_CONCURRENCY: usize = 4;

/// Grounding for one turn plus the lines rendered into the intent prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventSnapshot {
    pub grounding: Grounding,
    pub details: Vec<EventDetail>,
}

impl EventSnapshot {
    pub fn context_lines(&self) -> Vec<String> {
        if !self.details.is_empty() {
            return self.details.iter().map(EventDetail::context_line).collect();
        }
        self.grounding.events().iter().map(EventRef::context_line).collect()
    }

    pub fn grounding_note(&self) -> Option<&'static str> {
        match &self.grounding {
            Grounding::Available(_) => None,
            Grounding::Unavailable { .. } => {
                Some("the event list could not be loaded right now, so no event can be acted on")
            }
        }
    }
}

#[derive(Clone)]
pub struct EventContextProvider {
    platform: Arc<dyn EventPlatform>,
    max_pages: u32,
}

impl EventContextProvider {
    pub fn new(platform: Arc<dyn EventPlatform>, max_pages: u32) -> Self {
        Self { platform, max_pages: max_pages.max(1) }
    }

    /// Follows `next_cursor` up to `max_pages`. A failure on the first page
    /// makes grounding unavailable; a later failure keeps what was loaded.
    pub async fn load(&self, correlation_id: &str) -> Grounding {
        let mut events = Vec::new();
        let mut cursor: Option<String> = None;

        for page_number in 0..self.max_pages {
            match self.platform.list_events(cursor.as_deref()).await {
                Ok(page) => {
                    events.extend(page.events);
                    match page.next_cursor {
                        Some(next) if !next.is_empty() => cursor = Some(next),
                        _ => return Grounding::Available(events),
                    }
                }
                Err(error) if page_number == 0 => {
                    warn!(
                        event_name = "agent.context.unavailable",
                        correlation_id,
                        error = %error,
                        "event list could not be loaded"
                    );
                    return Grounding::Unavailable { reason: error.to_string() };
                }
                Err(error) => {
                    warn!(
                        event_name = "agent.context.partial",
                        correlation_id,
                        loaded = events.len(),
                        page_number,
                        error = %error,
                        "event list truncated after page failure"
                    );
                    return Grounding::Available(events);
                }
            }
        }

        warn!(
            event_name = "agent.context.page_limit",
            correlation_id,
            max_pages = self.max_pages,
            loaded = events.len(),
            "event list truncated at page limit"
        );
        Grounding::Available(events)
    }

    /// Fetches details concurrently, at most [`HYDRATION_CONCURRENCY`] at a
    /// time, preserving input order. A failed fetch drops only that event.
    pub async fn hydrate(&self, events: &[EventRef], correlation_id: &str) -> Vec<EventDetail> {
        let limit = Arc::new(Semaphore::new(HYDRATION_CONCURRENCY));
        let mut tasks = JoinSet::new();
        for (index, event) in events.iter().enumerate() {
            let platform = Arc::clone(&self.platform);
            let limit = Arc::clone(&limit);
            let event_id = event.id.clone();
            tasks.spawn(async move {
                let result = match limit.acquire_owned().await {
                    Ok(_permit) => platform.get_event(&event_id).await,
                    Err(closed) => Err(PlatformError::Other(closed.to_string())),
                };
                (index, event_id, result)
            });
        }

        let mut hydrated: Vec<(usize, EventDetail)> = Vec::with_capacity(events.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(detail))) => hydrated.push((index, detail)),
                Ok((_, event_id, Err(error))) => warn!(
                    event_name = "agent.context.detail_failed",
                    correlation_id,
                    event_id = %event_id,
                    error = %error,
                    "dropping event whose details could not be fetched"
                ),
                Err(error) => warn!(
                    event_name = "agent.context.detail_failed",
                    correlation_id,
                    error = %error,
                    "event detail task did not complete"
                ),
            }
        }

        hydrated.sort_by_key(|(index, _)| *index);
        hydrated.into_iter().map(|(_, detail)| detail).collect()
    }

    /// Loads grounding and, when asked, hydrates details. Events whose
    /// details failed are removed from the grounding too; if every fetch
    /// failed the grounding is unavailable rather than empty.
    pub async fn snapshot(&self, hydrate: bool, correlation_id: &str) -> EventSnapshot {
        let grounding = self.load(correlation_id).await;
        if !hydrate {
            return EventSnapshot { grounding, details: Vec::new() };
        }

        let Grounding::Available(events) = &grounding else {
            return EventSnapshot { grounding, details: Vec::new() };
        };
        let details = self.hydrate(events, correlation_id).await;
        if details.is_empty() && !events.is_empty() {
            warn!(
                event_name = "agent.context.unavailable",
                correlation_id,
                listed = events.len(),
                "no event details could be loaded"
            );
            let reason = format!("details failed for all {} listed events", events.len());
            return EventSnapshot { grounding: Grounding::Unavailable { reason }, details };
        }
        let grounding =
            Grounding::Available(details.iter().map(EventDetail::to_event_ref).collect());
        EventSnapshot { grounding, details }
    }
}
