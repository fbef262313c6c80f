//! Global relay state

use std::sync::Arc;

use serde::Serialize;

use da_core::config::RelayConfig;
use da_core::Channel;
use da_protocol::Role;

use crate::dispatch::Dispatcher;
use crate::groups::{GroupBroadcaster, GroupName};
use crate::rate_limit::RateLimiter;
use crate::registry::{ConnectionId, ConnectionRegistry};

/// Global state for the relay daemon
pub struct RelayState {
    /// Configuration
    pub config: RelayConfig,
    /// Live connections
    pub registry: Arc<ConnectionRegistry>,
    /// Broadcast groups
    pub groups: Arc<GroupBroadcaster>,
    /// Command cooldowns
    pub limiter: Arc<RateLimiter>,
    /// Message router
    pub dispatcher: Dispatcher,
}

/// Snapshot served by the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub connections: usize,
    /// Connections that have not completed the handshake
    pub pending: usize,
    pub groups: Vec<GroupSize>,
}

/// Member count of one group
#[derive(Debug, Clone, Serialize)]
pub struct GroupSize {
    pub group: String,
    pub members: usize,
}

impl RelayState {
    /// Create new relay state
    pub fn new(config: RelayConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let groups = Arc::new(GroupBroadcaster::new(Arc::clone(&registry)));
        let limiter = Arc::new(RateLimiter::new(config.rate_limit_interval));
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&groups),
            Arc::clone(&limiter),
            config.shared_secret.clone(),
        );

        Self {
            config,
            registry,
            groups,
            limiter,
            dispatcher,
        }
    }

    /// Forget everything about a closed connection.
    ///
    /// Group membership goes first so no broadcast picks the connection up
    /// after its registry entry is gone.
    pub fn disconnect(&self, id: ConnectionId) {
        self.groups.leave_all(id);
        self.limiter.forget(id);
        if let Some(handle) = self.registry.remove(id) {
            tracing::info!(
                "{} disconnected ({:?}, {} channel, up {:?})",
                id,
                handle.role(),
                handle.channel,
                handle.connected_at.elapsed()
            );
        }
    }

    /// Current connection and group counts
    pub fn health(&self) -> HealthReport {
        let groups = Channel::ALL
            .iter()
            .flat_map(|&channel| {
                [Role::Controller, Role::Agent].map(|role| GroupName::new(channel, role))
            })
            .map(|group| GroupSize {
                group: group.to_string(),
                members: self.groups.len(group),
            })
            .collect();

        let connections = self.registry.list();
        let pending = connections.iter().filter(|c| c.role().is_none()).count();

        HealthReport {
            status: "ok",
            connections: connections.len(),
            pending,
            groups,
        }
    }
}
