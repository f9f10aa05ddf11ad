use guestline_db::{connect, AuditLogQuery, SqlAuditRepository};

use crate::commands::{block_on, load_config, CommandResult};

/// Newest first, scoped to the configured organization.
pub fn run(limit: u32, action: Option<String>) -> CommandResult {
    let config = match load_config("audit") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let query = AuditLogQuery {
        org_id: Some(config.platform.org_id.clone()),
        action_type: action,
        limit: limit.max(1),
    };

    let result = block_on("audit", async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let entries = SqlAuditRepository::new(pool.clone())
            .list_recent(&query)
            .await
            .map_err(|error| ("audit_read", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(entries)
    });

    match result {
        Ok(Ok(entries)) => CommandResult::success_with_data(
            "audit",
            format!("{} audit entries for org {}", entries.len(), config.platform.org_id),
            serde_json::to_value(&entries).ok(),
        ),
        Ok(Err((error_class, message, exit_code))) => {
            CommandResult::failure("audit", error_class, message, exit_code)
        }
        Err(failure) => failure,
    }
}
