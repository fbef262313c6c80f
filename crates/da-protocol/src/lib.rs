//! da-protocol: Wire protocol for deskagent
//!
//! This crate defines the JSON messages exchanged between controllers,
//! the relay, and agents over WebSocket text frames.

pub mod envelope;
pub mod error;
pub mod message;
pub mod telemetry;

pub use envelope::Envelope;
pub use error::ProtocolError;
pub use message::{FeedbackStatus, LogLevel, Message, MessageType, Role};
pub use telemetry::HostSnapshot;
