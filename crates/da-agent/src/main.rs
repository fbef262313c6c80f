//! deskagent agent daemon
//!
//! The agent takes no command-line flags. It reads its config file and the
//! environment, then stays connected to the relay until terminated.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use da_agent::AgentState;
use da_core::config::{self, AgentConfig, ENV_AGENT_CONFIG};

/// Environment variable holding the log filter
const ENV_LOG: &str = "DESKAGENT_LOG";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = std::env::var(ENV_LOG)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("deskagent agent starting...");

    // Load configuration
    let config_path = std::env::var_os(ENV_AGENT_CONFIG)
        .map(PathBuf::from)
        .unwrap_or_else(AgentConfig::default_path);
    let mut config: AgentConfig = config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    config.apply_env(|key| std::env::var(key).ok());
    config.validate().context("Invalid agent configuration")?;

    let state = AgentState::new(config);
    tracing::info!(
        "Allowed actions: {}",
        state.executor.policy().actions().collect::<Vec<_>>().join(", ")
    );

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    state.run(cancel).await;

    tracing::info!("Agent shutdown complete");
    Ok(())
}

/// Cancel `cancel` on Ctrl+C or SIGTERM
async fn shutdown_on_signal(cancel: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }

    cancel.cancel();
}
