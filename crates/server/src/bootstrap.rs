use std::sync::Arc;

use guestline_agent::llm::{GeminiConfig, LlmError};
use guestline_agent::prompts::PromptError;
use guestline_agent::{AgentRuntime, AgentSettings, GeminiClient};
use guestline_chat::{
    build_dispatcher, PollingRunner, ReconnectPolicy, TelegramTransport, TransportError,
};
use guestline_core::audit::AuditRecorder;
use guestline_core::config::{AppConfig, ConfigError, LoadOptions};
use guestline_core::platform::PlatformError;
use guestline_db::{connect, migrations, DbPool, SqlAuditRepository};
use thiserror::Error;
use tracing::info;

use crate::health::HealthState;
use crate::platform::HttpEventPlatform;
use crate::service::AgentService;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runner: PollingRunner,
}

impl Application {
    pub fn health_state(&self) -> HealthState {
        HealthState::new(self.db_pool.clone(), self.config.platform.org_id.as_str())
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("event platform client could not be built: {0}")]
    Platform(#[from] PlatformError),
    #[error("language model client could not be built: {0}")]
    Llm(#[from] LlmError),
    #[error("prompt templates failed to load: {0}")]
    Prompts(#[from] PromptError),
    #[error("chat transport could not be built: {0}")]
    Transport(#[from] TransportError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    bootstrap_with_config(AppConfig::load(options)?).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let platform = Arc::new(HttpEventPlatform::new(&config.platform)?);
    let llm = Arc::new(GeminiClient::new(GeminiConfig::from(&config.llm))?);
    let audit = AuditRecorder::new(Arc::new(SqlAuditRepository::new(db_pool.clone())));
    let runtime = AgentRuntime::new(llm, platform, audit, AgentSettings::from_config(&config))?;

    let service = AgentService::new(Arc::new(runtime), config.platform.org_id.as_str());
    let dispatcher = build_dispatcher(service.clone(), service);
    let transport = Arc::new(TelegramTransport::new(&config.chat)?);
    let runner = PollingRunner::new(transport, dispatcher, ReconnectPolicy::default());
    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        org_id = %config.platform.org_id,
        guest_updates_enabled = config.agent.allow_guest_updates,
        "agent runtime and chat runner assembled"
    );

    Ok(Application { config, db_pool, runner })
}
