use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Approval state of a guest as reported by the event platform.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuestStatus {
    Approved,
    Declined,
    PendingApproval,
    Invited,
    Waitlist,
    Other(String),
}

impl GuestStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "approved" => Self::Approved,
            "declined" => Self::Declined,
            "pending_approval" | "pending" => Self::PendingApproval,
            "invited" => Self::Invited,
            "waitlist" | "waitlisted" => Self::Waitlist,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Approved => "approved",
            Self::Declined => "declined",
            Self::PendingApproval => "pending_approval",
            Self::Invited => "invited",
            Self::Waitlist => "waitlist",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Statuses the platform accepts as a filter on the guest list.
    pub fn is_filterable(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl std::fmt::Display for GuestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The only statuses an operator may set from chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Approved,
    Declined,
}

impl DecisionStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "approved" => Some(Self::Approved),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Declined => "declined",
        }
    }
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub email: String,
    pub name: Option<String>,
    pub status: GuestStatus,
    pub registered_at: Option<DateTime<Utc>>,
}

impl Guest {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|name| !name.trim().is_empty()).unwrap_or("(no name)")
    }
}

/// Accepts `local@domain.tld` with no whitespace and exactly one `@`.
pub fn is_plausible_email(candidate: &str) -> bool {
    let candidate = candidate.trim();
    if candidate.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
