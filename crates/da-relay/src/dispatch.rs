//! Message routing
//!
//! | type        | sender role | channel   | effect                                   |
//! |-------------|-------------|-----------|------------------------------------------|
//! | `hello`     | any         | any       | handshake                                |
//! | `heartbeat` | agent       | any       | `status` to the channel's controllers    |
//! | `command`   | controller  | control   | rate limit, then raw message to agents   |
//! | `feedback`  | agent       | control   | raw message to controllers               |
//! | `log`       | agent       | control   | raw message to controllers               |
//! | `pc_info`   | agent       | telemetry | raw message to telemetry controllers     |
//!
//! Anything before the handshake gets an error reply. After it, unknown
//! types and role mismatches are dropped without a reply.

use std::sync::Arc;
use std::time::Instant;

use da_core::time::unix_timestamp;
use da_core::Channel;
use da_protocol::{Envelope, Message, MessageType, Role};

use crate::groups::{GroupBroadcaster, GroupName};
use crate::handshake::{self, HandshakeOutcome};
use crate::rate_limit::{self, RateLimiter};
use crate::registry::{ConnectionHandle, ConnectionRegistry};

/// Routing decision for one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Run the handshake
    Handshake,
    /// Sender has no role yet; reply with an error
    RejectUnauthenticated,
    /// Emit a fresh `status` to this group
    EmitStatus(GroupName),
    /// Rate limit, then forward verbatim to this group
    RateLimitedForward(GroupName),
    /// Forward verbatim to this group
    Forward(GroupName),
    /// Ignore silently
    Drop,
}

/// Pure routing table
pub fn route(channel: Channel, sender: Option<Role>, kind: Option<MessageType>) -> Route {
    if kind == Some(MessageType::Hello) {
        return Route::Handshake;
    }

    let Some(sender) = sender else {
        return Route::RejectUnauthenticated;
    };

    match (channel, sender, kind) {
        (_, Role::Agent, Some(MessageType::Heartbeat)) => {
            Route::EmitStatus(GroupName::controllers(channel))
        }
        (Channel::Control, Role::Controller, Some(MessageType::Command)) => {
            Route::RateLimitedForward(GroupName::agents(Channel::Control))
        }
        (Channel::Control, Role::Agent, Some(MessageType::Feedback | MessageType::Log)) => {
            Route::Forward(GroupName::controllers(Channel::Control))
        }
        (Channel::Telemetry, Role::Agent, Some(MessageType::Telemetry)) => {
            Route::Forward(GroupName::controllers(Channel::Telemetry))
        }
        _ => Route::Drop,
    }
}

/// What the connection loop should do after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading
    Continue,
    /// Stop reading; the close frame is already queued
    Close,
}

/// Applies routing decisions against shared relay state
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    groups: Arc<GroupBroadcaster>,
    limiter: Arc<RateLimiter>,
    shared_secret: String,
}

impl Dispatcher {
    /// Create a dispatcher
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        groups: Arc<GroupBroadcaster>,
        limiter: Arc<RateLimiter>,
        shared_secret: String,
    ) -> Self {
        Self {
            registry,
            groups,
            limiter,
            shared_secret,
        }
    }

    /// Handle one inbound message from `conn`
    pub fn dispatch(&self, conn: &ConnectionHandle, envelope: &Envelope) -> Flow {
        let route = route(conn.channel, conn.role(), envelope.kind());
        tracing::trace!(
            "{} ({:?}) sent {:?} -> {:?}",
            conn.id,
            conn.role(),
            envelope.type_name(),
            route
        );

        match route {
            Route::Handshake => return self.handshake(conn, envelope),
            Route::RejectUnauthenticated => {
                conn.reply(&Message::error_feedback(handshake::HANDSHAKE_REQUIRED));
            }
            Route::EmitStatus(group) => {
                if let Err(e) = self
                    .groups
                    .broadcast_message(group, &Message::online(unix_timestamp()))
                {
                    tracing::error!("Failed to encode status for {}: {}", group, e);
                }
            }
            Route::RateLimitedForward(group) => {
                if self.limiter.allow(conn.id, Instant::now()) {
                    tracing::info!(
                        "Command {:?} from {} forwarded to {}",
                        envelope.action(),
                        conn.id,
                        group
                    );
                    self.groups.broadcast(group, Arc::clone(envelope.raw()));
                } else {
                    tracing::debug!("Command from {} rate limited", conn.id);
                    conn.reply(&Message::error_feedback(rate_limit::RATE_LIMITED));
                }
            }
            Route::Forward(group) => {
                self.groups.broadcast(group, Arc::clone(envelope.raw()));
            }
            Route::Drop => {
                tracing::debug!(
                    "Dropped {:?} from {} ({:?} on {})",
                    envelope.type_name(),
                    conn.id,
                    conn.role(),
                    conn.channel
                );
            }
        }

        Flow::Continue
    }

    fn handshake(&self, conn: &ConnectionHandle, hello: &Envelope) -> Flow {
        if let Some(existing) = conn.role() {
            tracing::debug!("{} sent hello again while {}", conn.id, existing);
            conn.reply(&Message::error_feedback(handshake::ROLE_ALREADY_ASSIGNED));
            return Flow::Continue;
        }

        match handshake::evaluate_hello(hello, &self.shared_secret) {
            HandshakeOutcome::Accepted(role) => {
                if let Err(e) = self.registry.set_role(conn.id, role) {
                    tracing::warn!("Handshake for {} lost a race: {}", conn.id, e);
                    conn.reply(&Message::error_feedback(handshake::ROLE_ALREADY_ASSIGNED));
                    return Flow::Continue;
                }

                let group = GroupName::new(conn.channel, role);
                if let Err(e) = self.groups.join(group, conn.id) {
                    tracing::error!("Failed to add {} to {}: {}", conn.id, group, e);
                }

                tracing::info!(
                    "{} registered as {} on {} channel ({:?})",
                    conn.id,
                    role,
                    conn.channel,
                    conn.peer_addr
                );
                Flow::Continue
            }
            HandshakeOutcome::Rejected { reason, terminal } => {
                conn.reply(&Message::error_feedback(reason));
                if terminal {
                    tracing::warn!(
                        "Rejected {} from {:?}: {}",
                        conn.id,
                        conn.peer_addr,
                        reason
                    );
                    conn.close(reason);
                    Flow::Close
                } else {
                    tracing::debug!("Hello from {} not accepted: {}", conn.id, reason);
                    Flow::Continue
                }
            }
        }
    }
}
