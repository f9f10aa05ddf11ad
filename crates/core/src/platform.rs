//! Port towards the event platform that owns events and guest lists.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::event::{EventDetail, EventId, EventRef};
use crate::domain::guest::{DecisionStatus, Guest, GuestStatus};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("authentication with the event platform failed: {0}")]
    Authentication(String),
    #[error("not found on the event platform: {0}")]
    NotFound(String),
    #[error("event platform request failed: {0}")]
    Other(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformErrorKind {
    Authentication,
    NotFound,
    Other,
}

impl PlatformError {
    pub fn kind(&self) -> PlatformErrorKind {
        match self {
            Self::Authentication(_) => PlatformErrorKind::Authentication,
            Self::NotFound(_) => PlatformErrorKind::NotFound,
            Self::Other(_) => PlatformErrorKind::Other,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventPage {
    pub events: Vec<EventRef>,
    pub next_cursor: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GuestPage {
    pub guests: Vec<Guest>,
    pub has_more: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuestStatusUpdate {
    pub event_id: EventId,
    pub guest_email: String,
    pub status: DecisionStatus,
    pub should_refund: bool,
}

/// Calls keyed by a single organization's credential.
#[async_trait]
pub trait EventPlatform: Send + Sync {
    async fn list_events(&self, cursor: Option<&str>) -> Result<EventPage, PlatformError>;

    async fn get_event(&self, event_id: &EventId) -> Result<EventDetail, PlatformError>;

    async fn get_guests(
        &self,
        event_id: &EventId,
        status_filter: Option<&GuestStatus>,
    ) -> Result<GuestPage, PlatformError>;

    async fn update_guest_status(&self, update: &GuestStatusUpdate) -> Result<(), PlatformError>;
}
