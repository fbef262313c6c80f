//! Relay error types

use da_core::Channel;
use da_protocol::Role;
use thiserror::Error;

use crate::groups::GroupName;
use crate::registry::ConnectionId;

/// Errors from the connection registry
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// Role is write-once; the first assignment won
    #[error("{id} already has role {existing}")]
    AlreadyAssigned { id: ConnectionId, existing: Role },

    /// No live connection with this id
    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),
}

/// Errors from group membership changes
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GroupError {
    /// The connection's channel or role does not match the group
    #[error("{id} ({channel}, {role:?}) cannot join {group}")]
    RoleMismatch {
        id: ConnectionId,
        group: GroupName,
        channel: Channel,
        role: Option<Role>,
    },

    /// No live connection with this id
    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),
}
