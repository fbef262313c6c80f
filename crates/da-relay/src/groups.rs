//! Role-scoped broadcast groups
//!
//! Each channel has a controller group and an agent group. Membership is a
//! set of connection IDs; delivery goes through each member's bounded
//! outbound queue with `try_send`, so a slow member loses frames instead of
//! stalling fan-out to everyone else.
//!
//! Every sender broadcasts from its own connection task and each member has
//! a single FIFO queue, so frames from one sender reach a member in the
//! order they were sent.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use da_core::Channel;
use da_protocol::{Message, ProtocolError, Role};

use crate::error::GroupError;
use crate::registry::{ConnectionId, ConnectionRegistry, Outbound, SendFailure};

/// A broadcast target: one role within one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupName {
    pub channel: Channel,
    pub role: Role,
}

impl GroupName {
    /// Create a group name
    pub const fn new(channel: Channel, role: Role) -> Self {
        Self { channel, role }
    }

    /// Controller group of a channel
    pub const fn controllers(channel: Channel) -> Self {
        Self::new(channel, Role::Controller)
    }

    /// Agent group of a channel
    pub const fn agents(channel: Channel) -> Self {
        Self::new(channel, Role::Agent)
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-group", self.channel, self.role)
    }
}

/// Result of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Members whose queue accepted the frame
    pub delivered: usize,
    /// Members skipped because they disconnected or were backed up
    pub skipped: usize,
}

/// Group membership and fan-out
pub struct GroupBroadcaster {
    registry: Arc<ConnectionRegistry>,
    groups: DashMap<GroupName, HashSet<ConnectionId>>,
}

impl GroupBroadcaster {
    /// Create a broadcaster backed by `registry`
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            groups: DashMap::new(),
        }
    }

    /// Add a connection to a group.
    ///
    /// Fails unless the connection is live, arrived on the group's channel,
    /// and already holds the group's role.
    pub fn join(&self, group: GroupName, id: ConnectionId) -> Result<(), GroupError> {
        let handle = self
            .registry
            .get(id)
            .ok_or(GroupError::UnknownConnection(id))?;

        let role = handle.role();
        if handle.channel != group.channel || role != Some(group.role) {
            return Err(GroupError::RoleMismatch {
                id,
                group,
                channel: handle.channel,
                role,
            });
        }

        self.groups.entry(group).or_default().insert(id);
        tracing::debug!("{} joined {}", id, group);
        Ok(())
    }

    /// Remove a connection from a group. Returns whether it was a member.
    pub fn leave(&self, group: GroupName, id: ConnectionId) -> bool {
        let removed = self
            .groups
            .get_mut(&group)
            .map(|mut members| members.remove(&id))
            .unwrap_or(false);

        if removed {
            tracing::debug!("{} left {}", id, group);
        }
        removed
    }

    /// Remove a connection from every group
    pub fn leave_all(&self, id: ConnectionId) {
        for mut members in self.groups.iter_mut() {
            if members.remove(&id) {
                tracing::debug!("{} left {}", id, members.key());
            }
        }
    }

    /// Current members of a group
    pub fn members(&self, group: GroupName) -> Vec<ConnectionId> {
        self.groups
            .get(&group)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether `id` is currently in `group`
    pub fn contains(&self, group: GroupName, id: ConnectionId) -> bool {
        self.groups
            .get(&group)
            .map(|members| members.contains(&id))
            .unwrap_or(false)
    }

    /// Number of members in a group
    pub fn len(&self, group: GroupName) -> usize {
        self.groups.get(&group).map(|m| m.len()).unwrap_or(0)
    }

    /// Deliver a text frame to every current member.
    ///
    /// Members are snapshotted first, so the group lock is never held while
    /// queueing. A member that disconnects in between is skipped.
    pub fn broadcast(&self, group: GroupName, payload: Arc<str>) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for id in self.members(group) {
            let Some(handle) = self.registry.get(id) else {
                report.skipped += 1;
                continue;
            };

            match handle.try_send(Outbound::Text(Arc::clone(&payload))) {
                Ok(()) => report.delivered += 1,
                Err(SendFailure::Full) => {
                    tracing::warn!("Outbound queue full for {}, dropping frame for {}", id, group);
                    report.skipped += 1;
                }
                Err(SendFailure::Closed) => {
                    tracing::debug!("{} closed before delivery on {}", id, group);
                    report.skipped += 1;
                }
            }
        }

        tracing::trace!(
            "Broadcast to {}: delivered={} skipped={}",
            group,
            report.delivered,
            report.skipped
        );
        report
    }

    /// Serialize a relay-built message and broadcast it
    pub fn broadcast_message(
        &self,
        group: GroupName,
        message: &Message,
    ) -> Result<BroadcastReport, ProtocolError> {
        let text = message.to_json()?;
        Ok(self.broadcast(group, Arc::from(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConnectionHandle;
    use tokio::sync::mpsc;

    struct Fixture {
        registry: Arc<ConnectionRegistry>,
        groups: GroupBroadcaster,
    }

    impl Fixture {
        fn new() -> Self {
            let registry = Arc::new(ConnectionRegistry::new());
            let groups = GroupBroadcaster::new(Arc::clone(&registry));
            Self { registry, groups }
        }

        fn connect(
            &self,
            channel: Channel,
            role: Role,
            capacity: usize,
        ) -> (Arc<ConnectionHandle>, mpsc::Receiver<Outbound>) {
            let (tx, rx) = mpsc::channel(capacity);
            let handle = self.registry.register(channel, None, tx);
            self.registry.set_role(handle.id, role).unwrap();
            self.groups
                .join(GroupName::new(channel, role), handle.id)
                .unwrap();
            (handle, rx)
        }
    }

    fn text(rx: &mut mpsc::Receiver<Outbound>) -> Option<String> {
        match rx.try_recv() {
            Ok(Outbound::Text(t)) => Some(t.to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_broadcast_reaches_members_only() {
        let fx = Fixture::new();
        let (_a1, mut rx_a1) = fx.connect(Channel::Control, Role::Agent, 8);
        let (_a2, mut rx_a2) = fx.connect(Channel::Control, Role::Agent, 8);
        let (_c, mut rx_c) = fx.connect(Channel::Control, Role::Controller, 8);
        let (_t, mut rx_t) = fx.connect(Channel::Telemetry, Role::Agent, 8);

        let report = fx
            .groups
            .broadcast(GroupName::agents(Channel::Control), Arc::from("hi"));

        assert_eq!(report, BroadcastReport { delivered: 2, skipped: 0 });
        assert_eq!(text(&mut rx_a1).as_deref(), Some("hi"));
        assert_eq!(text(&mut rx_a2).as_deref(), Some("hi"));
        assert_eq!(text(&mut rx_c), None);
        assert_eq!(text(&mut rx_t), None);
    }

    #[test]
    fn test_left_member_receives_nothing_further() {
        let fx = Fixture::new();
        let group = GroupName::controllers(Channel::Control);
        let (c1, mut rx1) = fx.connect(Channel::Control, Role::Controller, 8);
        let (_c2, mut rx2) = fx.connect(Channel::Control, Role::Controller, 8);

        fx.groups.broadcast(group, Arc::from("first"));
        assert!(fx.groups.leave(group, c1.id));
        fx.groups.broadcast(group, Arc::from("second"));

        assert_eq!(text(&mut rx1).as_deref(), Some("first"));
        assert_eq!(text(&mut rx1), None);
        assert_eq!(text(&mut rx2).as_deref(), Some("first"));
        assert_eq!(text(&mut rx2).as_deref(), Some("second"));
        assert!(!fx.groups.leave(group, c1.id));
    }

    #[test]
    fn test_join_rejects_role_mismatch() {
        let fx = Fixture::new();
        let (tx, _rx) = mpsc::channel(1);
        let unset = fx.registry.register(Channel::Control, None, tx);

        let err = fx
            .groups
            .join(GroupName::agents(Channel::Control), unset.id)
            .unwrap_err();
        assert!(matches!(err, GroupError::RoleMismatch { role: None, .. }));

        let (controller, _rx2) = fx.connect(Channel::Control, Role::Controller, 1);
        assert!(fx
            .groups
            .join(GroupName::agents(Channel::Control), controller.id)
            .is_err());
        assert!(fx
            .groups
            .join(GroupName::controllers(Channel::Telemetry), controller.id)
            .is_err());
        assert_eq!(fx.groups.len(GroupName::agents(Channel::Control)), 0);
    }

    #[test]
    fn test_full_or_closed_members_are_skipped() {
        let fx = Fixture::new();
        let group = GroupName::controllers(Channel::Control);
        let (_slow, mut rx_slow) = fx.connect(Channel::Control, Role::Controller, 1);
        let (_gone, rx_gone) = fx.connect(Channel::Control, Role::Controller, 1);
        let (_ok, mut rx_ok) = fx.connect(Channel::Control, Role::Controller, 4);
        drop(rx_gone);

        fx.groups.broadcast(group, Arc::from("one"));
        let report = fx.groups.broadcast(group, Arc::from("two"));

        assert_eq!(report, BroadcastReport { delivered: 1, skipped: 2 });
        assert_eq!(text(&mut rx_slow).as_deref(), Some("one"));
        assert_eq!(text(&mut rx_slow), None);
        assert_eq!(text(&mut rx_ok).as_deref(), Some("one"));
        assert_eq!(text(&mut rx_ok).as_deref(), Some("two"));
    }

    #[test]
    fn test_removed_connection_is_skipped() {
        let fx = Fixture::new();
        let group = GroupName::agents(Channel::Control);
        let (agent, _rx) = fx.connect(Channel::Control, Role::Agent, 1);

        fx.registry.remove(agent.id);
        let report = fx.groups.broadcast(group, Arc::from("x"));
        assert_eq!(report, BroadcastReport { delivered: 0, skipped: 1 });

        fx.groups.leave_all(agent.id);
        assert!(!fx.groups.contains(group, agent.id));
    }

    #[test]
    fn test_group_name_display() {
        assert_eq!(
            GroupName::controllers(Channel::Telemetry).to_string(),
            "telemetry-controller-group"
        );
    }
}
