//! Command execution
//!
//! A received `command` is checked against the [`CommandPolicy`] and, if
//! allowed, launched fire-and-forget through a [`Spawner`]. The returned
//! [`Outcome`] becomes the agent's `log` and `feedback` for that command.

mod policy;
mod spawner;

pub use policy::{scheduled_shutdown_command, Action, CommandPolicy, Refusal, SHUTDOWN_WITH_TIME};
pub use spawner::{ShellSpawner, Spawner};

use std::sync::Arc;

use serde_json::{Map, Value};

use da_protocol::{FeedbackStatus, LogLevel, Message, Role};

/// Reply for an action outside the policy
pub const NOT_PERMITTED: &str = "command not permitted";

/// Reply for a bad `shutdown_with_time` payload
pub const INVALID_MINUTES: &str = "invalid minutes";

/// Result of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: FeedbackStatus,
    pub message: String,
}

impl Outcome {
    /// Successful outcome
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: FeedbackStatus::Success,
            message: message.into(),
        }
    }

    /// Failed outcome
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: FeedbackStatus::Error,
            message: message.into(),
        }
    }

    /// Check if the command was launched
    pub fn is_success(&self) -> bool {
        self.status == FeedbackStatus::Success
    }

    /// `feedback` message reporting this outcome
    pub fn to_feedback(&self) -> Message {
        Message::Feedback {
            role: Some(Role::Agent),
            status: self.status,
            message: self.message.clone(),
        }
    }

    /// `log` entry mirroring this outcome
    pub fn to_log(&self, timestamp: f64) -> Message {
        let level = match self.status {
            FeedbackStatus::Success => LogLevel::Success,
            FeedbackStatus::Error => LogLevel::Error,
        };
        Message::Log {
            level,
            source: "agent".to_string(),
            message: self.message.clone(),
            timestamp,
        }
    }
}

/// Validates and launches commands
pub struct CommandExecutor {
    policy: CommandPolicy,
    spawner: Arc<dyn Spawner>,
}

impl CommandExecutor {
    /// Create an executor
    pub fn new(policy: CommandPolicy, spawner: Arc<dyn Spawner>) -> Self {
        Self { policy, spawner }
    }

    /// Executor that launches through `sh -c`
    pub fn with_shell(policy: CommandPolicy) -> Self {
        Self::new(policy, Arc::new(ShellSpawner))
    }

    /// The policy commands are checked against
    pub fn policy(&self) -> &CommandPolicy {
        &self.policy
    }

    /// Execute `action` with the command's fields as `payload`
    pub fn execute(&self, action: &str, payload: &Map<String, Value>) -> Outcome {
        let resolved = match self.policy.resolve(action, payload) {
            Ok(resolved) => resolved,
            Err(Refusal::NotPermitted) => {
                tracing::warn!("Refusing action {:?}", action);
                return Outcome::error(NOT_PERMITTED);
            }
            Err(Refusal::InvalidMinutes) => {
                tracing::warn!("Refusing {} with minutes {:?}", action, payload.get("minutes"));
                return Outcome::error(INVALID_MINUTES);
            }
        };

        let command_line = resolved.command_line();
        if let Err(e) = self.spawner.spawn(&command_line) {
            tracing::error!("Failed to launch '{}': {}", command_line, e);
            return Outcome::error(format!("failed to launch '{}': {}", action, e));
        }

        tracing::info!("Launched '{}' for action {}", command_line, action);
        match resolved {
            Action::ShutdownWithTime { minutes } => {
                Outcome::success(format!("shutdown scheduled in {} minutes", minutes))
            }
            Action::Fixed { name, .. } => Outcome::success(format!("command '{}' executed", name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSpawner {
        launched: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingSpawner {
        fn launched(&self) -> Vec<String> {
            self.launched.lock().unwrap().clone()
        }
    }

    impl Spawner for RecordingSpawner {
        fn spawn(&self, command_line: &str) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no shell"));
            }
            self.launched.lock().unwrap().push(command_line.to_string());
            Ok(())
        }
    }

    fn executor() -> (CommandExecutor, Arc<RecordingSpawner>) {
        let spawner = Arc::new(RecordingSpawner::default());
        let executor = CommandExecutor::new(CommandPolicy::builtin(), spawner.clone());
        (executor, spawner)
    }

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_unknown_action_is_refused_without_side_effect() {
        let (executor, spawner) = executor();
        let outcome = executor.execute("format_disk", &Map::new());
        assert_eq!(outcome, Outcome::error(NOT_PERMITTED));
        assert!(spawner.launched().is_empty());
    }

    #[test]
    fn test_fixed_action_launches_once() {
        let (executor, spawner) = executor();
        let outcome = executor.execute("suspend", &payload(json!({"action": "suspend"})));
        assert_eq!(outcome, Outcome::success("command 'suspend' executed"));
        assert_eq!(spawner.launched(), ["sudo /bin/systemctl suspend"]);
    }

    #[test]
    fn test_reboot_with_empty_payload_launches_reboot_once() {
        let (executor, spawner) = executor();
        let outcome = executor.execute("reboot", &Map::new());
        assert_eq!(outcome, Outcome::success("command 'reboot' executed"));
        assert_eq!(spawner.launched(), ["sudo /sbin/reboot"]);
    }

    #[test]
    fn test_shutdown_with_time() {
        let (executor, spawner) = executor();

        for bad in [json!(-5), json!("10")] {
            let outcome = executor.execute(SHUTDOWN_WITH_TIME, &payload(json!({ "minutes": bad })));
            assert_eq!(outcome, Outcome::error(INVALID_MINUTES));
        }
        assert!(spawner.launched().is_empty());

        let outcome = executor.execute(SHUTDOWN_WITH_TIME, &payload(json!({"minutes": 10})));
        assert!(outcome.is_success());
        assert_eq!(outcome.message, "shutdown scheduled in 10 minutes");
        assert_eq!(spawner.launched(), [scheduled_shutdown_command(10)]);
    }

    #[test]
    fn test_launch_failure_is_an_error_outcome() {
        let spawner = Arc::new(RecordingSpawner {
            fail: true,
            ..Default::default()
        });
        let executor = CommandExecutor::new(CommandPolicy::builtin(), spawner);
        let outcome = executor.execute("ping", &Map::new());
        assert_eq!(outcome.status, FeedbackStatus::Error);
        assert!(outcome.message.contains("ping"));
    }

    #[test]
    fn test_outcome_messages() {
        let outcome = Outcome::error(INVALID_MINUTES);

        let feedback = serde_json::to_value(outcome.to_feedback()).unwrap();
        assert_eq!(
            feedback,
            json!({"type": "feedback", "role": "agent", "status": "error", "message": "invalid minutes"})
        );

        let log = serde_json::to_value(outcome.to_log(12.0)).unwrap();
        assert_eq!(log["type"], "log");
        assert_eq!(log["level"], "error");
        assert_eq!(log["source"], "agent");
        assert_eq!(log["timestamp"], 12.0);
    }
}
