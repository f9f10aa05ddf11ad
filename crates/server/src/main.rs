mod bootstrap;
mod health;
mod platform;
mod service;

use anyhow::Result;
use guestline_core::config::{AppConfig, LoadOptions};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins over `logging.level` when set.
fn init_logging(config: &AppConfig) {
    use guestline_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging needs the loaded config, so it is initialized before bootstrap.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.health_state(),
    )
    .await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        org_id = %app.config.platform.org_id,
        "guestline-server started"
    );

    tokio::select! {
        _ = app.runner.start() => {
            tracing::warn!(
                event_name = "system.server.runner_stopped",
                correlation_id = "shutdown",
                "chat polling loop stopped"
            );
        }
        signal = tokio::signal::ctrl_c() => signal?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "guestline-server stopping"
    );
    app.db_pool.close().await;

    Ok(())
}
