//! da-relay: Message relay between controllers and agents
//!
//! The relay accepts WebSocket connections on a control and a telemetry
//! channel, authenticates agents with a shared secret, and fans messages
//! out between the controller and agent groups of each channel.

pub mod dispatch;
pub mod error;
pub mod groups;
pub mod handshake;
pub mod rate_limit;
pub mod registry;
pub mod server;
pub mod state;

pub use dispatch::{Dispatcher, Flow, Route};
pub use groups::{GroupBroadcaster, GroupName};
pub use rate_limit::RateLimiter;
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, Outbound};
pub use state::RelayState;
