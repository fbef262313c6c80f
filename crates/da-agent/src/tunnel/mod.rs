//! Relay connection management
//!
//! [`Reconnector`] keeps one [`Session`] connected to the relay forever,
//! waiting a backoff delay after every failure or disconnect.

mod connector;
mod reconnect;

pub use connector::{ActiveLink, LinkSender};
pub use reconnect::ExponentialBackoff;

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use da_core::config::BackoffConfig;

/// Work done over one established connection
#[async_trait]
pub trait Session: Send {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Drive `link` until it closes, fails, or `cancel` fires
    async fn run(&mut self, link: &mut ActiveLink, cancel: CancellationToken) -> anyhow::Result<()>;
}

/// Reconnect loop for one relay channel
pub struct Reconnector {
    url: String,
    connect_timeout: Duration,
    backoff: BackoffConfig,
}

impl Reconnector {
    /// Create a reconnector for `url`
    pub fn new(url: impl Into<String>, connect_timeout: Duration, backoff: BackoffConfig) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
            backoff,
        }
    }

    /// Run `session` over successive connections until `cancel` fires
    pub async fn run<S: Session>(&self, session: &mut S, cancel: CancellationToken) {
        let mut backoff = ExponentialBackoff::from_config(&self.backoff);

        while !cancel.is_cancelled() {
            match ActiveLink::connect(&self.url, self.connect_timeout).await {
                Ok(mut link) => {
                    tracing::info!("{} connected to {}", session.name(), self.url);
                    backoff.reset();

                    let result = session.run(&mut link, cancel.child_token()).await;
                    link.close().await;

                    match result {
                        Ok(()) => tracing::info!("{} connection closed", session.name()),
                        Err(e) => tracing::warn!("{} connection failed: {:#}", session.name(), e),
                    }
                }
                Err(e) => tracing::warn!("{} could not connect: {}", session.name(), e),
            }

            if cancel.is_cancelled() {
                break;
            }

            let delay = backoff.next_delay();
            tracing::info!("{} reconnecting in {:?}", session.name(), delay);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("{} stopped", session.name());
    }
}
