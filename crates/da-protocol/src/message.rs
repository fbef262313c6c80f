//! Message types for the deskagent protocol
//!
//! Every frame is a UTF-8 JSON object with a `type` discriminator. Inbound
//! frames are inspected through [`crate::Envelope`] so that unknown fields
//! survive forwarding untouched; frames the relay or an agent builds itself
//! are modelled by [`Message`].
//!
//! # Message Flow
//!
//! 1. Every connection opens with `hello` declaring its role (agents add `token`)
//! 2. Controllers send `command`, which the relay fans out to agents
//! 3. Agents answer with `log` and `feedback`, fanned out to controllers
//! 4. Agents emit `heartbeat`; the relay turns each one into a `status`
//! 5. On the telemetry channel agents push `pc_info` samples

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProtocolError;
use crate::telemetry::HostSnapshot;

/// Role a connection declares during the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Issues commands and receives feedback/telemetry
    #[serde(alias = "app")]
    Controller,
    /// Runs on the managed host and executes commands
    Agent,
}

impl Role {
    /// Wire name of this role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Controller => "controller",
            Role::Agent => "agent",
        }
    }

    /// Parse a role hint from a `hello` message.
    ///
    /// `app` is accepted as a legacy name for controllers.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "controller" | "app" => Some(Role::Controller),
            "agent" => Some(Role::Agent),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Role declaration, first message on every connection
    Hello,
    /// Agent liveness ping
    Heartbeat,
    /// Controller request for an agent action
    Command,
    /// Result of a command (or a relay-side rejection)
    Feedback,
    /// Free-form agent log line
    Log,
    /// Relay-generated agent liveness notice
    Status,
    /// Host telemetry sample
    Telemetry,
}

impl MessageType {
    /// Wire name of this message type
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Hello => "hello",
            MessageType::Heartbeat => "heartbeat",
            MessageType::Command => "command",
            MessageType::Feedback => "feedback",
            MessageType::Log => "log",
            MessageType::Status => "status",
            MessageType::Telemetry => "pc_info",
        }
    }

    /// Parse the `type` field of an inbound message
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "hello" => Some(Self::Hello),
            "heartbeat" => Some(Self::Heartbeat),
            "command" => Some(Self::Command),
            "feedback" => Some(Self::Feedback),
            "log" => Some(Self::Log),
            "status" => Some(Self::Status),
            "telemetry" | "pc_info" => Some(Self::Telemetry),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome status carried by `feedback`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    Success,
    Error,
}

/// Severity carried by `log`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Messages built locally by the relay or an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Role declaration
    Hello {
        role: Role,
        /// Shared secret, required for agents
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },

    /// Agent liveness ping
    Heartbeat { role: Role },

    /// Command outcome or relay-side rejection
    Feedback {
        /// Sender role, set when an agent reports an outcome
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<Role>,
        status: FeedbackStatus,
        message: String,
    },

    /// Agent log line
    Log {
        level: LogLevel,
        source: String,
        message: String,
        /// Unix time in seconds
        timestamp: f64,
    },

    /// Agent liveness as seen by the relay
    Status {
        online: bool,
        /// Unix time in seconds
        timestamp: f64,
    },

    /// Host telemetry sample
    #[serde(rename = "pc_info")]
    Telemetry(HostSnapshot),
}

impl Message {
    /// Get the message type for this message
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Hello { .. } => MessageType::Hello,
            Message::Heartbeat { .. } => MessageType::Heartbeat,
            Message::Feedback { .. } => MessageType::Feedback,
            Message::Log { .. } => MessageType::Log,
            Message::Status { .. } => MessageType::Status,
            Message::Telemetry(_) => MessageType::Telemetry,
        }
    }

    /// Error feedback sent by the relay to the offending connection
    pub fn error_feedback(message: impl Into<String>) -> Self {
        Message::Feedback {
            role: None,
            status: FeedbackStatus::Error,
            message: message.into(),
        }
    }

    /// Liveness notice the relay emits for each agent heartbeat
    pub fn online(timestamp: f64) -> Self {
        Message::Status {
            online: true,
            timestamp,
        }
    }

    /// Serialize into the JSON text sent on the wire
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}
