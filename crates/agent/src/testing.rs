use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use guestline_core::domain::event::{EventDetail, EventId, EventRef};
use guestline_core::domain::guest::{Guest, GuestStatus};
use guestline_core::platform::{
    EventPage, EventPlatform, GuestPage, GuestStatusUpdate, PlatformError,
};

use crate::llm::{LlmClient, LlmCompletion, LlmError, LlmRequest};

/// Replays canned completions in order and records every prompt it saw.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<LlmCompletion, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Result<LlmCompletion, LlmError>>) -> Self {
        Self { replies: Mutex::new(replies.into()), prompts: Mutex::new(Vec::new()) }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|text| Ok(LlmCompletion::text(*text))).collect())
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|prompts| prompts.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmCompletion, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }
        let next = self.replies.lock().ok().and_then(|mut replies| replies.pop_front());
        next.unwrap_or_else(|| Err(LlmError::InvalidResponse("script exhausted".to_string())))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlatformCall {
    ListEvents(Option<String>),
    GetEvent(String),
    GetGuests(String, Option<String>),
    UpdateGuestStatus(GuestStatusUpdate),
}

/// In-memory event platform with per-call failure injection.
#[derive(Default)]
pub struct FakePlatform {
    pub pages: Vec<EventPage>,
    pub details: HashMap<String, EventDetail>,
    pub guests: HashMap<String, Vec<Guest>>,
    pub guests_have_more: bool,
    pub list_error: Option<PlatformError>,
    /// Failures keyed by page index, for paging that breaks midway.
    pub page_errors: HashMap<usize, PlatformError>,
    pub update_error: Option<PlatformError>,
    pub detail_errors: HashMap<String, PlatformError>,
    pub(crate) calls: Mutex<Vec<PlatformCall>>,
    pub(crate) detail_fetches: AtomicUsize,
    pub(crate) peak_detail_fetches: AtomicUsize,
}

impl FakePlatform {
    pub fn with_events(events: Vec<EventRef>) -> Self {
        Self { pages: vec![EventPage { events, next_cursor: None }], ..Self::default() }
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn update_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, PlatformCall::UpdateGuestStatus(_)))
            .count()
    }

    pub fn peak_detail_fetches(&self) -> usize {
        self.peak_detail_fetches.load(Ordering::SeqCst)
    }

    fn record(&self, call: PlatformCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

pub fn guest(email: &str, name: &str, status: GuestStatus) -> Guest {
    Guest { email: email.to_string(), name: Some(name.to_string()), status, registered_at: None }
}

pub fn detail(id: &str, name: &str, location: Option<&str>) -> EventDetail {
    EventDetail {
        id: EventId(id.to_string()),
        name: name.to_string(),
        start_at: None,
        end_at: None,
        timezone: None,
        location: location.map(str::to_string),
        url: None,
        description: None,
    }
}

#[async_trait]
impl EventPlatform for FakePlatform {
    async fn list_events(&self, cursor: Option<&str>) -> Result<EventPage, PlatformError> {
        self.record(PlatformCall::ListEvents(cursor.map(str::to_string)));
        if let Some(error) = &self.list_error {
            return Err(error.clone());
        }
        let index = cursor.and_then(|cursor| cursor.parse::<usize>().ok()).unwrap_or(0);
        if let Some(error) = self.page_errors.get(&index) {
            return Err(error.clone());
        }
        Ok(self.pages.get(index).cloned().unwrap_or_default())
    }

    async fn get_event(&self, event_id: &EventId) -> Result<EventDetail, PlatformError> {
        self.record(PlatformCall::GetEvent(event_id.to_string()));
        let in_flight = self.detail_fetches.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_detail_fetches.fetch_max(in_flight, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.detail_fetches.fetch_sub(1, Ordering::SeqCst);
        if let Some(error) = self.detail_errors.get(event_id.as_str()) {
            return Err(error.clone());
        }
        self.details
            .get(event_id.as_str())
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("event {event_id}")))
    }

    async fn get_guests(
        &self,
        event_id: &EventId,
        status_filter: Option<&GuestStatus>,
    ) -> Result<GuestPage, PlatformError> {
        self.record(PlatformCall::GetGuests(
            event_id.to_string(),
            status_filter.map(|status| status.to_string()),
        ));
        let guests = self
            .guests
            .get(event_id.as_str())
            .ok_or_else(|| PlatformError::NotFound(format!("event {event_id}")))?;
        let guests = guests
            .iter()
            .filter(|guest| status_filter.map_or(true, |status| &guest.status == status))
            .cloned()
            .collect();
        Ok(GuestPage { guests, has_more: self.guests_have_more })
    }

    async fn update_guest_status(&self, update: &GuestStatusUpdate) -> Result<(), PlatformError> {
        self.record(PlatformCall::UpdateGuestStatus(update.clone()));
        match &self.update_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
