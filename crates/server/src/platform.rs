//! HTTP client for the event platform's public API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use guestline_core::config::PlatformConfig;
use guestline_core::domain::event::{EventDetail, EventId, EventRef};
use guestline_core::domain::guest::{Guest, GuestStatus};
use guestline_core::platform::{
    EventPage, EventPlatform, GuestPage, GuestStatusUpdate, PlatformError,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const API_KEY_HEADER: &str = "x-luma-api-key";

pub struct HttpEventPlatform {
    client: Client,
    base_url: String,
    api_key: SecretString,
    page_size: u32,
}

impl HttpEventPlatform {
    pub fn new(config: &PlatformConfig) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| PlatformError::Other(error.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            page_size: config.page_size.max(1),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path)).header(API_KEY_HEADER, self.api_key.expose_secret())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        target: &str,
    ) -> Result<T, PlatformError> {
        let response =
            request.send().await.map_err(|error| PlatformError::Other(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, target, &body));
        }
        response.json().await.map_err(|error| {
            PlatformError::Other(format!("unexpected response for {target}: {error}"))
        })
    }
}

fn classify_status(status: StatusCode, target: &str, body: &str) -> PlatformError {
    let detail = upstream_message(body).unwrap_or_else(|| format!("HTTP {status}"));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformError::Authentication(detail),
        StatusCode::NOT_FOUND => PlatformError::NotFound(target.to_string()),
        _ => PlatformError::Other(format!("{target}: {detail}")),
    }
}

fn upstream_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
    }
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message)
        .filter(|message| !message.trim().is_empty())
}

#[async_trait]
impl EventPlatform for HttpEventPlatform {
    async fn list_events(&self, cursor: Option<&str>) -> Result<EventPage, PlatformError> {
        let mut query = vec![("pagination_limit", self.page_size.to_string())];
        if let Some(cursor) = cursor {
            query.push(("pagination_cursor", cursor.to_string()));
        }
        let page: EntriesPage<EventEntry> =
            self.send(self.get("calendar/list-events").query(&query), "event list").await?;
        debug!(
            event_name = "platform.events.page_loaded",
            count = page.entries.len(),
            has_more = page.has_more,
            "event page loaded"
        );

        Ok(EventPage {
            events: page.entries.into_iter().map(|entry| entry.event.into_ref()).collect(),
            next_cursor: if page.has_more { page.next_cursor } else { None },
        })
    }

    async fn get_event(&self, event_id: &EventId) -> Result<EventDetail, PlatformError> {
        let request = self.get("event/get").query(&[("api_id", event_id.as_str())]);
        let body: EventEnvelope = self.send(request, &format!("event {event_id}")).await?;
        Ok(body.event.into_detail())
    }

    async fn get_guests(
        &self,
        event_id: &EventId,
        status_filter: Option<&GuestStatus>,
    ) -> Result<GuestPage, PlatformError> {
        let mut query = vec![
            ("event_api_id", event_id.to_string()),
            ("pagination_limit", self.page_size.to_string()),
        ];
        if let Some(status) = status_filter.filter(|status| status.is_filterable()) {
            query.push(("approval_status", status.to_string()));
        }
        let request = self.get("event/get-guests").query(&query);
        let page: EntriesPage<GuestEntry> =
            self.send(request, &format!("guests of event {event_id}")).await?;

        Ok(GuestPage {
            guests: page.entries.into_iter().map(|entry| entry.guest.into_guest()).collect(),
            has_more: page.has_more,
        })
    }

    async fn update_guest_status(&self, update: &GuestStatusUpdate) -> Result<(), PlatformError> {
        let request = self
            .client
            .post(self.url("event/update-guest-status"))
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(&json!({
                "event_api_id": update.event_id.as_str(),
                "guest": {"type": "email", "email": update.guest_email},
                "status": update.status.as_str(),
                "should_refund": update.should_refund,
            }));
        let target = format!("guest {} on event {}", update.guest_email, update.event_id);
        self.send::<serde_json::Value>(request, &target).await.map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
struct EntriesPage<T> {
    #[serde(default = "Vec::new")]
    entries: Vec<T>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventEntry {
    event: RawEvent,
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    event: RawEvent,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    api_id: String,
    name: String,
    start_at: Option<DateTime<Utc>>,
    end_at: Option<DateTime<Utc>>,
    timezone: Option<String>,
    url: Option<String>,
    description: Option<String>,
    geo_address_json: Option<RawAddress>,
}

#[derive(Debug, Deserialize)]
struct RawAddress {
    full_address: Option<String>,
    city: Option<String>,
}

impl RawEvent {
    fn into_ref(self) -> EventRef {
        EventRef { id: EventId(self.api_id), name: self.name, start_at: self.start_at }
    }

    fn into_detail(self) -> EventDetail {
        let location = self
            .geo_address_json
            .and_then(|address| address.full_address.or(address.city))
            .filter(|location| !location.trim().is_empty());
        EventDetail {
            id: EventId(self.api_id),
            name: self.name,
            start_at: self.start_at,
            end_at: self.end_at,
            timezone: self.timezone,
            location,
            url: self.url,
            description: self.description,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GuestEntry {
    guest: RawGuest,
}

#[derive(Debug, Deserialize)]
struct RawGuest {
    email: String,
    name: Option<String>,
    approval_status: String,
    registered_at: Option<DateTime<Utc>>,
}

impl RawGuest {
    fn into_guest(self) -> Guest {
        Guest {
            email: self.email,
            name: self.name,
            status: GuestStatus::parse(&self.approval_status),
            registered_at: self.registered_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use guestline_core::config::PlatformConfig;
    use guestline_core::domain::event::EventId;
    use guestline_core::domain::guest::{DecisionStatus, GuestStatus};
    use guestline_core::platform::{EventPlatform, GuestStatusUpdate, PlatformError};
    use httpmock::prelude::*;
    use secrecy::SecretString;
    use serde_json::json;

    use super::HttpEventPlatform;

    fn platform(server: &MockServer) -> HttpEventPlatform {
        let config = PlatformConfig {
            api_key: SecretString::from("luma-key".to_string()),
            base_url: server.base_url(),
            org_id: "org-1".to_string(),
            page_size: 2,
            max_pages: 3,
            timeout_secs: 5,
        };
        HttpEventPlatform::new(&config).expect("platform client")
    }

    #[tokio::test]
    async fn list_events_sends_key_and_cursor() {
        let server = MockServer::start_async().await;
        let page = server.mock(|when, then| {
            when.method(GET)
                .path("/calendar/list-events")
                .header("x-luma-api-key", "luma-key")
                .query_param("pagination_limit", "2")
                .query_param("pagination_cursor", "c1");
            then.status(200).json_body(json!({
                "entries": [
                    {"api_id": "calev-1", "event": {"api_id": "evt-1", "name": "ETHDenver",
                        "start_at": "2025-03-01T09:00:00Z"}},
                    {"api_id": "calev-2", "event": {"api_id": "evt-2", "name": "Token2049"}}
                ],
                "has_more": true,
                "next_cursor": "c2"
            }));
        });

        let result = platform(&server).list_events(Some("c1")).await.expect("events");

        page.assert_calls(1);
        assert_eq!(result.events.len(), 2);
        assert_eq!(result.events[0].id, EventId("evt-1".to_string()));
        assert!(result.events[0].start_at.is_some());
        assert_eq!(result.events[1].start_at, None);
        assert_eq!(result.next_cursor.as_deref(), Some("c2"));
    }

    #[tokio::test]
    async fn last_page_has_no_cursor() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/calendar/list-events");
            then.status(200)
                .json_body(json!({"entries": [], "has_more": false, "next_cursor": "stale"}));
        });

        let result = platform(&server).list_events(None).await.expect("events");
        assert!(result.events.is_empty());
        assert_eq!(result.next_cursor, None);
    }

    #[tokio::test]
    async fn get_event_maps_location() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/event/get").query_param("api_id", "evt-3");
            then.status(200).json_body(json!({"event": {
                "api_id": "evt-3",
                "name": "Token2049",
                "start_at": "2025-04-30T08:00:00Z",
                "end_at": "2025-05-01T18:00:00Z",
                "timezone": "Asia/Dubai",
                "url": "https://lu.ma/token2049",
                "geo_address_json": {"city": "Dubai"}
            }}));
        });

        let detail =
            platform(&server).get_event(&EventId("evt-3".to_string())).await.expect("event");
        assert_eq!(detail.location.as_deref(), Some("Dubai"));
        assert_eq!(detail.timezone.as_deref(), Some("Asia/Dubai"));
        assert!(detail.end_at.is_some());
    }

    #[tokio::test]
    async fn get_guests_filters_by_status_and_reports_more() {
        let server = MockServer::start_async().await;
        let guests = server.mock(|when, then| {
            when.method(GET)
                .path("/event/get-guests")
                .query_param("event_api_id", "evt-1")
                .query_param("approval_status", "approved");
            then.status(200).json_body(json!({
                "entries": [
                    {"api_id": "g-1", "guest": {"email": "jane@x.com", "name": "Jane Doe",
                        "approval_status": "approved"}},
                    {"api_id": "g-2", "guest": {"email": "sam@x.com", "name": null,
                        "approval_status": "approved"}}
                ],
                "has_more": true
            }));
        });

        let page = platform(&server)
            .get_guests(&EventId("evt-1".to_string()), Some(&GuestStatus::Approved))
            .await
            .expect("guests");

        guests.assert_calls(1);
        assert_eq!(page.guests.len(), 2);
        assert_eq!(page.guests[0].status, GuestStatus::Approved);
        assert_eq!(page.guests[1].display_name(), "(no name)");
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn update_posts_email_status_and_refund_flag() {
        let server = MockServer::start_async().await;
        let update = server.mock(|when, then| {
            when.method(POST).path("/event/update-guest-status").json_body(json!({
                "event_api_id": "evt-1",
                "guest": {"type": "email", "email": "jane@x.com"},
                "status": "declined",
                "should_refund": true
            }));
            then.status(200).json_body(json!({}));
        });

        platform(&server)
            .update_guest_status(&GuestStatusUpdate {
                event_id: EventId("evt-1".to_string()),
                guest_email: "jane@x.com".to_string(),
                status: DecisionStatus::Declined,
                should_refund: true,
            })
            .await
            .expect("updated");
        update.assert_calls(1);
    }

    #[tokio::test]
    async fn http_statuses_are_classified() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/event/get").query_param("api_id", "evt-locked");
            then.status(403).json_body(json!({"message": "Invalid API key"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/event/get").query_param("api_id", "evt-gone");
            then.status(404).json_body(json!({"message": "Event not found"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/event/get").query_param("api_id", "evt-busy");
            then.status(503).body("upstream unavailable");
        });
        let platform = platform(&server);

        let locked = platform.get_event(&EventId("evt-locked".to_string())).await;
        assert_eq!(locked, Err(PlatformError::Authentication("Invalid API key".to_string())));

        let gone = platform.get_event(&EventId("evt-gone".to_string())).await;
        assert_eq!(gone, Err(PlatformError::NotFound("event evt-gone".to_string())));

        let busy = platform.get_event(&EventId("evt-busy".to_string())).await;
        assert!(matches!(busy, Err(PlatformError::Other(ref message)) if message.contains("503")));
    }
}
