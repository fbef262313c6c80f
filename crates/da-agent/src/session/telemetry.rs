//! Telemetry channel session

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use da_protocol::Message;

use super::{check_relay_feedback, heartbeat_loop, hello};
use crate::metrics::TelemetrySampler;
use crate::tunnel::{ActiveLink, Session};

/// Pushes a `pc_info` sample every tick
pub struct TelemetrySession<T> {
    sampler: T,
    shared_secret: String,
    heartbeat_interval: Duration,
    sample_interval: Duration,
}

impl<T: TelemetrySampler> TelemetrySession<T> {
    /// Create a telemetry session
    pub fn new(
        sampler: T,
        shared_secret: impl Into<String>,
        heartbeat_interval: Duration,
        sample_interval: Duration,
    ) -> Self {
        Self {
            sampler,
            shared_secret: shared_secret.into(),
            heartbeat_interval,
            sample_interval,
        }
    }

    async fn report_loop(
        &mut self,
        link: &mut ActiveLink,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let sender = link.sender();
        let mut ticker = tokio::time::interval(self.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {
                    let snapshot = self.sampler.sample().await;
                    tracing::trace!("Sampled cpu={:.1}% mem={}", snapshot.cpu_percent, snapshot.memory_used);
                    sender.send(&Message::Telemetry(snapshot)).await?;
                }
                inbound = link.recv() => match inbound? {
                    Some(envelope) => check_relay_feedback(&envelope)?,
                    None => return Ok(()),
                },
            }
        }
    }
}

#[async_trait]
impl<T: TelemetrySampler> Session for TelemetrySession<T> {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    async fn run(&mut self, link: &mut ActiveLink, cancel: CancellationToken) -> anyhow::Result<()> {
        link.send(&hello(&self.shared_secret)).await?;

        let heartbeat = tokio::spawn(heartbeat_loop(
            link.sender(),
            self.heartbeat_interval,
            cancel.clone(),
        ));

        let result = self.report_loop(link, &cancel).await;

        cancel.cancel();
        let _ = heartbeat.await;
        result
    }
}
