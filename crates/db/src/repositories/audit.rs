use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use guestline_core::audit::{AuditActor, AuditEntry, AuditStore, AuditStoreError};

use super::RepositoryError;
use crate::DbPool;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditLogQuery {
    pub org_id: Option<String>,
    pub action_type: Option<String>,
    pub limit: u32,
}

impl Default for AuditLogQuery {
    fn default() -> Self {
        Self { org_id: None, action_type: None, limit: 20 }
    }
}

#[derive(Clone)]
pub struct SqlAuditRepository {
    pool: DbPool,
}

impl SqlAuditRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: &AuditEntry) -> Result<(), RepositoryError> {
        let details_json = serde_json::to_string(&entry.details)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO audit_log (id, occurred_at, action_type, org_id, user_id, group_id,
                                    success, details_json)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.entry_id)
        .bind(entry.occurred_at.to_rfc3339())
        .bind(&entry.action_type)
        .bind(&entry.org_id)
        .bind(entry.actor.user_id())
        .bind(entry.actor.group_id())
        .bind(entry.success)
        .bind(details_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Newest first.
    pub async fn list_recent(
        &self,
        query: &AuditLogQuery,
    ) -> Result<Vec<AuditEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, occurred_at, action_type, org_id, user_id, group_id, success, details_json
             FROM audit_log
             WHERE (?1 IS NULL OR org_id = ?1)
               AND (?2 IS NULL OR action_type = ?2)
             ORDER BY occurred_at DESC, rowid DESC
             LIMIT ?3",
        )
        .bind(query.org_id.as_deref())
        .bind(query.action_type.as_deref())
        .bind(i64::from(query.limit.max(1)))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    pub async fn count(&self) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM audit_log")
            .fetch_one(&self.pool)
            .await?)
    }
}

#[async_trait]
impl AuditStore for SqlAuditRepository {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditStoreError> {
        self.insert(entry).await.map_err(|error| AuditStoreError(error.to_string()))
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<AuditEntry, RepositoryError> {
    let entry_id: String =
        row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let occurred_at_str: String =
        row.try_get("occurred_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let action_type: String =
        row.try_get("action_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let org_id: String =
        row.try_get("org_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: Option<String> =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let group_id: Option<String> =
        row.try_get("group_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let success: bool =
        row.try_get("success").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let details_json: String =
        row.try_get("details_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let occurred_at = DateTime::parse_from_rfc3339(&occurred_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("occurred_at: {e}")))?;
    let actor = match (user_id, group_id) {
        (Some(user_id), None) => AuditActor::User(user_id),
        (None, Some(group_id)) => AuditActor::Group(group_id),
        _ => {
            return Err(RepositoryError::Decode(format!(
                "audit entry {entry_id} must carry exactly one of user_id or group_id"
            )))
        }
    };
    let details = serde_json::from_str(&details_json)
        .map_err(|e| RepositoryError::Decode(format!("details_json: {e}")))?;

    Ok(AuditEntry { entry_id, occurred_at, action_type, org_id, actor, success, details })
}
