//! Connection registry
//!
//! Tracks every live connection from accept to disconnect. A connection's
//! role starts unset and is assigned exactly once, during the handshake.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use da_core::Channel;
use da_protocol::{Message, Role};

use crate::error::RegistryError;

/// Unique identifier for a relay connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Frame queued for a connection's writer task
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// JSON text frame, shared between all recipients of a broadcast
    Text(Arc<str>),
    /// Close the socket with a policy-violation code and this reason
    Close(String),
}

/// Why a frame could not be queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// The writer is behind; the frame was dropped
    Full,
    /// The writer has exited
    Closed,
}

/// A live connection
pub struct ConnectionHandle {
    /// Connection identifier
    pub id: ConnectionId,
    /// Channel the connection arrived on
    pub channel: Channel,
    /// Remote address, when known
    pub peer_addr: Option<SocketAddr>,
    /// When the connection was accepted
    pub connected_at: Instant,
    role: OnceLock<Role>,
    tx: mpsc::Sender<Outbound>,
}

impl ConnectionHandle {
    /// Declared role, `None` until the handshake succeeds
    pub fn role(&self) -> Option<Role> {
        self.role.get().copied()
    }

    /// Queue a frame without waiting
    pub fn try_send(&self, frame: Outbound) -> Result<(), SendFailure> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SendFailure::Full,
            TrySendError::Closed(_) => SendFailure::Closed,
        })
    }

    /// Serialize and queue a relay-built message for this connection only
    pub fn reply(&self, message: &Message) {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to encode reply for {}: {}", self.id, e);
                return;
            }
        };

        if let Err(failure) = self.try_send(Outbound::Text(Arc::from(text))) {
            tracing::warn!("Dropped reply to {}: {:?}", self.id, failure);
        }
    }

    /// Queue a close frame after everything already queued
    pub fn close(&self, reason: impl Into<String>) {
        if let Err(failure) = self.try_send(Outbound::Close(reason.into())) {
            tracing::debug!("Could not queue close for {}: {:?}", self.id, failure);
        }
    }
}

/// Registry of live connections
pub struct ConnectionRegistry {
    /// Connections indexed by ID
    connections: DashMap<ConnectionId, Arc<ConnectionHandle>>,
    /// Next ID to hand out
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Record a newly accepted connection with no role
    pub fn register(
        &self,
        channel: Channel,
        peer_addr: Option<SocketAddr>,
        tx: mpsc::Sender<Outbound>,
    ) -> Arc<ConnectionHandle> {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handle = Arc::new(ConnectionHandle {
            id,
            channel,
            peer_addr,
            connected_at: Instant::now(),
            role: OnceLock::new(),
            tx,
        });

        self.connections.insert(id, Arc::clone(&handle));
        tracing::debug!("Registered {} on {} channel", id, channel);
        handle
    }

    /// Assign a role. The first assignment wins; later ones fail.
    pub fn set_role(&self, id: ConnectionId, role: Role) -> Result<(), RegistryError> {
        let handle = self
            .get(id)
            .ok_or(RegistryError::UnknownConnection(id))?;

        handle.role.set(role).map_err(|_| RegistryError::AlreadyAssigned {
            id,
            existing: handle.role().unwrap_or(role),
        })
    }

    /// Role of a connection; `None` if unset or unknown
    pub fn role_of(&self, id: ConnectionId) -> Option<Role> {
        self.connections.get(&id).and_then(|h| h.role())
    }

    /// Get a connection by ID
    pub fn get(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&id).map(|r| Arc::clone(&r))
    }

    /// Remove a connection
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.remove(&id).map(|(_, handle)| handle)
    }

    /// List all connections
    pub fn list(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections.iter().map(|r| Arc::clone(&r)).collect()
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
