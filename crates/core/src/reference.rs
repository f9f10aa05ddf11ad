//! Event reference resolution
//!
//! Maps an event mentioned by id or by a fragment of its name onto one of the
//! events known for the current turn. Multiple name matches are never
//! auto-picked: they come back as an [`AmbiguityMatch`] that the caller must
//! surface as a numbered question.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::event::{format_start, EventId, EventRef};

/// What the user (or the model) said about the event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMention {
    pub event_id: Option<String>,
    pub event_name: Option<String>,
}

impl EventMention {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self { event_id: Some(id.into()), event_name: None }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self { event_id: None, event_name: Some(name.into()) }
    }

    fn id(&self) -> Option<&str> {
        self.event_id.as_deref().map(str::trim).filter(|value| !value.is_empty())
    }

    fn name(&self) -> Option<&str> {
        self.event_name.as_deref().map(str::trim).filter(|value| !value.is_empty())
    }
}

/// The set of events a turn is grounded on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Grounding {
    Available(Vec<EventRef>),
    Unavailable { reason: String },
}

impl Grounding {
    pub fn events(&self) -> &[EventRef] {
        match self {
            Self::Available(events) => events,
            Self::Unavailable { .. } => &[],
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguityMatch {
    pub query: String,
    pub candidates: Vec<EventRef>,
}

impl AmbiguityMatch {
    pub fn clarification_prompt(&self) -> String {
        let mut lines = vec![format!(
            "I found {} events matching \"{}\". Which one do you mean?",
            self.candidates.len(),
            self.query
        )];
        for (index, candidate) in self.candidates.iter().enumerate() {
            lines.push(format!(
                "{}. {} (id: {}, starts: {})",
                index + 1,
                candidate.name,
                candidate.id,
                format_start(candidate.start_at)
            ));
        }
        lines.push("Reply with the event id to continue.".to_string());
        lines.join("\n")
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("event `{0}` was not found in the current event list")]
    NotFound(String),
    #[error("no event matches name \"{0}\"")]
    NoMatch(String),
    #[error("multiple events match \"{}\"", .0.query)]
    Ambiguous(AmbiguityMatch),
    #[error("no event was specified; mention an event name or id")]
    MissingReference,
    #[error("the event list is unavailable right now: {0}")]
    GroundingUnavailable(String),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceResolver;

impl ReferenceResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(
        &self,
        mention: &EventMention,
        grounding: &Grounding,
    ) -> Result<EventRef, ResolveError> {
        if mention.id().is_none() && mention.name().is_none() {
            return Err(ResolveError::MissingReference);
        }

        let events = match grounding {
            Grounding::Available(events) => events,
            Grounding::Unavailable { reason } => {
                return Err(ResolveError::GroundingUnavailable(reason.clone()))
            }
        };

        if let Some(id) = mention.id() {
            return events
                .iter()
                .find(|event| event.id.as_str() == id)
                .cloned()
                .ok_or_else(|| ResolveError::NotFound(id.to_string()));
        }

        let Some(name) = mention.name() else {
            return Err(ResolveError::MissingReference);
        };
        let needle = name.to_lowercase();
        let mut candidates = events
            .iter()
            .filter(|event| event.name.to_lowercase().contains(&needle))
            .cloned()
            .collect::<Vec<_>>();

        match candidates.len() {
            0 => Err(ResolveError::NoMatch(name.to_string())),
            1 => Ok(candidates.remove(0)),
            _ => Err(ResolveError::Ambiguous(AmbiguityMatch {
                query: name.to_string(),
                candidates,
            })),
        }
    }

    pub fn resolve_id(
        &self,
        mention: &EventMention,
        grounding: &Grounding,
    ) -> Result<EventId, ResolveError> {
        self.resolve(mention, grounding).map(|event| event.id)
    }
}
