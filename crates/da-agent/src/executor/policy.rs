//! Allowed actions
//!
//! The policy maps action names to fixed command lines, plus the single
//! parameterized `shutdown_with_time` action. It is built once at startup
//! and shared read-only by every command.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Name of the parameterized scheduled-shutdown action
pub const SHUTDOWN_WITH_TIME: &str = "shutdown_with_time";

/// Built-in fixed actions
const BUILTIN_ACTIONS: &[(&str, &str)] = &[
    ("shutdown", "sudo /sbin/shutdown now"),
    ("reboot", "sudo /sbin/reboot"),
    ("suspend", "sudo /bin/systemctl suspend"),
    ("cancel", "sudo /sbin/shutdown -c"),
    ("ping", "makefoot"),
    ("pkill_discord", "sudo /usr/bin/pkill Discord"),
    ("pkill_chrome", "sudo /usr/bin/pkill Brave"),
    ("pkill_code", "sudo /usr/bin/pkill code"),
];

/// Command line that schedules a shutdown `minutes` from now
pub fn scheduled_shutdown_command(minutes: u64) -> String {
    format!("sudo /sbin/shutdown +{}", minutes)
}

/// A command resolved against the policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// One of the fixed actions
    Fixed { name: String, command_line: String },
    /// Shutdown after a positive number of minutes
    ShutdownWithTime { minutes: u64 },
}

impl Action {
    /// Command line to launch
    pub fn command_line(&self) -> String {
        match self {
            Action::Fixed { command_line, .. } => command_line.clone(),
            Action::ShutdownWithTime { minutes } => scheduled_shutdown_command(*minutes),
        }
    }
}

/// Why a command was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    /// Action is not in the policy
    NotPermitted,
    /// `minutes` missing or not a positive integer
    InvalidMinutes,
}

/// Immutable action policy
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    fixed: BTreeMap<String, String>,
}

impl CommandPolicy {
    /// The built-in action table
    pub fn builtin() -> Self {
        Self {
            fixed: BUILTIN_ACTIONS
                .iter()
                .map(|(name, cmd)| (name.to_string(), cmd.to_string()))
                .collect(),
        }
    }

    /// Built-in table with `overrides` applied.
    ///
    /// An override with an empty command line removes the action. The
    /// parameterized action cannot be overridden.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut policy = Self::builtin();
        for (name, command_line) in overrides {
            if name == SHUTDOWN_WITH_TIME {
                tracing::warn!("Ignoring override for reserved action '{}'", name);
                continue;
            }
            if command_line.trim().is_empty() {
                policy.fixed.remove(name);
            } else {
                policy.fixed.insert(name.clone(), command_line.clone());
            }
        }
        policy
    }

    /// Resolve `action` and its payload to something launchable
    pub fn resolve(&self, action: &str, payload: &Map<String, Value>) -> Result<Action, Refusal> {
        if action == SHUTDOWN_WITH_TIME {
            // JSON integers only: "10", 10.0 and negatives are refused
            return payload
                .get("minutes")
                .and_then(Value::as_u64)
                .filter(|minutes| *minutes > 0)
                .map(|minutes| Action::ShutdownWithTime { minutes })
                .ok_or(Refusal::InvalidMinutes);
        }

        self.fixed
            .get(action)
            .map(|command_line| Action::Fixed {
                name: action.to_string(),
                command_line: command_line.clone(),
            })
            .ok_or(Refusal::NotPermitted)
    }

    /// Names of the fixed actions
    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.fixed.keys().map(String::as_str)
    }
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self::builtin()
    }
}
