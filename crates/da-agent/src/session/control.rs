//! Control channel session

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use da_core::time::unix_timestamp;
use da_core::DaError;
use da_protocol::{Envelope, LogLevel, MessageType};

use super::{agent_log, check_relay_feedback, heartbeat_loop, hello};
use crate::executor::CommandExecutor;
use crate::tunnel::{ActiveLink, LinkSender, Session};

/// Receives commands and answers each with a `log` and a `feedback`
pub struct ControlSession {
    executor: Arc<CommandExecutor>,
    shared_secret: String,
    heartbeat_interval: Duration,
}

impl ControlSession {
    /// Create a control session
    pub fn new(
        executor: Arc<CommandExecutor>,
        shared_secret: impl Into<String>,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            executor,
            shared_secret: shared_secret.into(),
            heartbeat_interval,
        }
    }

    async fn handle_command(&self, sender: &LinkSender, envelope: &Envelope) -> Result<(), DaError> {
        let action = envelope.action().unwrap_or_default();
        tracing::info!("Received command {:?}", action);

        let outcome = self.executor.execute(action, envelope.body());
        sender.send(&outcome.to_log(unix_timestamp())).await?;
        sender.send(&outcome.to_feedback()).await
    }

    async fn receive_loop(
        &self,
        link: &mut ActiveLink,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let sender = link.sender();

        loop {
            let envelope = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                inbound = link.recv() => match inbound? {
                    Some(envelope) => envelope,
                    None => return Ok(()),
                },
            };

            match envelope.kind() {
                Some(MessageType::Command) => self.handle_command(&sender, &envelope).await?,
                Some(MessageType::Feedback) => check_relay_feedback(&envelope)?,
                _ => tracing::trace!("Ignoring {:?} on control channel", envelope.type_name()),
            }
        }
    }
}

#[async_trait]
impl Session for ControlSession {
    fn name(&self) -> &'static str {
        "control"
    }

    async fn run(&mut self, link: &mut ActiveLink, cancel: CancellationToken) -> anyhow::Result<()> {
        link.send(&hello(&self.shared_secret)).await?;
        link.send(&agent_log(LogLevel::Info, "agent connected")).await?;

        let heartbeat = tokio::spawn(heartbeat_loop(
            link.sender(),
            self.heartbeat_interval,
            cancel.clone(),
        ));

        let result = self.receive_loop(link, &cancel).await;

        cancel.cancel();
        let _ = heartbeat.await;
        result
    }
}
