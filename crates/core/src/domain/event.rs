use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of a known event used to ground a single turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRef {
    pub id: EventId,
    pub name: String,
    pub start_at: Option<DateTime<Utc>>,
}

impl EventRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: EventId(id.into()), name: name.into(), start_at: None }
    }

    pub fn starting_at(mut self, start_at: DateTime<Utc>) -> Self {
        self.start_at = Some(start_at);
        self
    }

    /// Renders the event as a grounding line: `name (id: X, starts: Y)`.
    pub fn context_line(&self) -> String {
        format!("{} (id: {}, starts: {})", self.name, self.id, format_start(self.start_at))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetail {
    pub id: EventId,
    pub name: String,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
}

impl EventDetail {
    pub fn to_event_ref(&self) -> EventRef {
        EventRef { id: self.id.clone(), name: self.name.clone(), start_at: self.start_at }
    }

    pub fn context_line(&self) -> String {
        match &self.location {
            Some(location) => format!("{}, location: {location}", self.to_event_ref().context_line()),
            None => self.to_event_ref().context_line(),
        }
    }
}

pub fn format_start(start_at: Option<DateTime<Utc>>) -> String {
    start_at
        .map(|value| value.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{EventDetail, EventId, EventRef};

    #[test]
    fn context_line_includes_id_and_start() {
        let event = EventRef::new("evt-1", "ETHDenver")
            .starting_at(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());

        assert_eq!(event.context_line(), "ETHDenver (id: evt-1, starts: 2025-03-01 09:00 UTC)");
    }

    #[test]
    fn context_line_marks_unknown_start() {
        assert_eq!(
            EventRef::new("evt-2", "Side Event").context_line(),
            "Side Event (id: evt-2, starts: unknown)"
        );
    }

    #[test]
    fn detail_context_line_appends_location() {
        let detail = EventDetail {
            id: EventId("evt-3".to_string()),
            name: "Token2049".to_string(),
            start_at: None,
            end_at: None,
            timezone: None,
            location: Some("Dubai".to_string()),
            url: None,
            description: None,
        };

        assert!(detail.context_line().ends_with("location: Dubai"));
    }
}
