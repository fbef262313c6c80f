//! deskagent relay daemon
//!
//! The relay accepts WebSocket connections from controllers and agents and
//! routes commands, feedback, logs and telemetry between them.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use da_core::config::{self, RelayConfig, ENV_RELAY_CONFIG};
use da_core::secret::generate_secret;
use da_relay::server::RelayServer;
use da_relay::RelayState;

#[derive(Parser)]
#[command(name = "da-relay")]
#[command(about = "deskagent relay daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = ENV_RELAY_CONFIG)]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print a fresh shared secret and exit
    #[arg(long)]
    generate_secret: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.generate_secret {
        println!("{}", generate_secret());
        return Ok(());
    }

    // Initialize logging
    let log_level = if args.foreground { "debug" } else { &args.log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("deskagent relay starting...");

    // Load configuration
    let config_path = args.config.unwrap_or_else(RelayConfig::default_path);
    let mut config: RelayConfig = config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    config.apply_env(|key| std::env::var(key).ok());

    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    config.validate().context("Invalid relay configuration")?;

    if config.shared_secret.is_empty() {
        tracing::warn!("No shared secret configured - every agent will be rejected");
    }

    let bind_addr = config.bind_address.clone();
    let state = Arc::new(RelayState::new(config));

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    let server = RelayServer::new(Arc::clone(&state), cancel.clone());
    server.run(&bind_addr).await?;

    tracing::info!("Relay shutdown complete");
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
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown...");
        }
    }

    cancel.cancel();
}
