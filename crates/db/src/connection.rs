use std::time::Duration;

use guestline_core::config::DatabaseConfig;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::debug;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&database.url, database.max_connections, database.timeout_secs).await
}

/// Opens a pool with WAL journaling and a busy timeout so the chat loop and
/// the CLI can share one database file.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let database_url = if database_url == ":memory:" { "sqlite::memory:" } else { database_url };
    debug!(
        event_name = "db.pool.connect",
        max_connections = max_connections.max(1),
        timeout_secs = timeout_secs.max(1),
        "opening sqlite pool"
    );

    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

pub async fn ping(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::{connect_with_settings, ping};

    #[tokio::test]
    async fn memory_alias_connects_and_answers_ping() {
        let pool = connect_with_settings(":memory:", 1, 5).await.expect("connect");
        ping(&pool).await.expect("ping");
        pool.close().await;
        assert!(ping(&pool).await.is_err());
    }
}
