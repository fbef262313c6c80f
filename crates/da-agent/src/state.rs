//! Agent state management

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use da_core::config::AgentConfig;

use crate::executor::{CommandExecutor, CommandPolicy};
use crate::metrics::SysinfoSampler;
use crate::session::{ControlSession, TelemetrySession};
use crate::tunnel::Reconnector;

/// Global state for the agent daemon
pub struct AgentState {
    /// Configuration
    pub config: AgentConfig,
    /// Command executor shared by every control session
    pub executor: Arc<CommandExecutor>,
}

impl AgentState {
    /// Create new agent state with the shell spawner
    pub fn new(config: AgentConfig) -> Self {
        let policy = CommandPolicy::with_overrides(&config.actions);
        let executor = Arc::new(CommandExecutor::with_shell(policy));
        Self::with_executor(config, executor)
    }

    /// Create agent state around an existing executor
    pub fn with_executor(config: AgentConfig, executor: Arc<CommandExecutor>) -> Self {
        Self { config, executor }
    }

    /// Run the control channel, and the telemetry channel when configured,
    /// until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) {
        let config = &self.config;

        let control = async {
            let reconnector = Reconnector::new(
                config.relay_url.clone(),
                config.connect_timeout,
                config.backoff.clone(),
            );
            let mut session = ControlSession::new(
                Arc::clone(&self.executor),
                config.shared_secret.clone(),
                config.heartbeat_interval,
            );
            reconnector.run(&mut session, cancel.clone()).await;
        };

        let telemetry = async {
            let Some(url) = &config.telemetry_url else {
                tracing::info!("No telemetry URL configured, telemetry disabled");
                return;
            };
            let reconnector =
                Reconnector::new(url.clone(), config.connect_timeout, config.backoff.clone());
            let mut session = TelemetrySession::new(
                SysinfoSampler::new(),
                config.shared_secret.clone(),
                config.telemetry_heartbeat_interval,
                config.telemetry_interval,
            );
            reconnector.run(&mut session, cancel.clone()).await;
        };

        tokio::join!(control, telemetry);
    }
}
