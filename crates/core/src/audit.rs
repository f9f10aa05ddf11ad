use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Who triggered an audited action: a user in a direct chat, or a shared group chat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AuditActor {
    User(String),
    Group(String),
}

impl AuditActor {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User(id) => Some(id),
            Self::Group(_) => None,
        }
    }

    pub fn group_id(&self) -> Option<&str> {
        match self {
            Self::Group(id) => Some(id),
            Self::User(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: String,
    pub occurred_at: DateTime<Utc>,
    pub action_type: String,
    pub org_id: String,
    pub actor: AuditActor,
    pub success: bool,
    pub details: Value,
}

impl AuditEntry {
    pub fn new(
        action_type: impl Into<String>,
        org_id: impl Into<String>,
        actor: AuditActor,
        success: bool,
        details: Value,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4().to_string(),
            occurred_at: Utc::now(),
            action_type: action_type.into(),
            org_id: org_id.into(),
            actor,
            success,
            details,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("audit store write failed: {0}")]
pub struct AuditStoreError(pub String);

/// Append-only storage for audit entries.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditStoreError>;
}

/// Best-effort recorder: storage failures are logged and swallowed so they
/// never alter the outcome of the audited action.
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    pub async fn record(
        &self,
        action_type: &str,
        org_id: &str,
        actor: AuditActor,
        success: bool,
        details: Value,
    ) {
        let entry = AuditEntry::new(action_type, org_id, actor, success, details);
        if let Err(error) = self.store.append(&entry).await {
            warn!(
                event_name = "audit.write_failed",
                entry_id = %entry.entry_id,
                action_type = %entry.action_type,
                org_id = %entry.org_id,
                success = entry.success,
                error = %error,
                "failed to persist audit entry"
            );
        }
    }
}
