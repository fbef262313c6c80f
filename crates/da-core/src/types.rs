//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical channel a connection belongs to.
///
/// The relay serves each channel on its own endpoint and keeps a separate
/// pair of groups per channel; nothing is shared between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Commands, feedback, logs and liveness
    Control,
    /// Host telemetry samples
    Telemetry,
}

impl Channel {
    /// Both channels, in a fixed order
    pub const ALL: [Channel; 2] = [Channel::Control, Channel::Telemetry];

    /// Short name used in logs and group labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Control => "control",
            Channel::Telemetry => "telemetry",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
