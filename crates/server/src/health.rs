use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use guestline_db::{connection::ping, DbPool, SqlAuditRepository};
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    org_id: String,
}

impl HealthState {
    pub fn new(db_pool: DbPool, org_id: impl Into<String>) -> Self {
        Self { db_pool, org_id: org_id.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub org_id: String,
    pub audit_log: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Binds before returning so a port clash fails startup instead of the task.
pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let audit_log = audit_log_check(&state.db_pool).await;
    let ready = audit_log.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        org_id: state.org_id.clone(),
        audit_log,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn audit_log_check(pool: &DbPool) -> HealthCheck {
    if let Err(error) = ping(pool).await {
        return HealthCheck {
            status: "degraded",
            detail: format!("audit database unreachable: {error}"),
        };
    }
    match SqlAuditRepository::new(pool.clone()).count().await {
        Ok(count) => HealthCheck { status: "ready", detail: format!("{count} audit entries") },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("audit log unreadable: {error}") }
        }
    }
}
