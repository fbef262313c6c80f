//! Sessions run over a relay connection
//!
//! Both sessions open with an agent `hello` carrying the shared secret and
//! keep a heartbeat task alive next to their receive loop. The heartbeat is
//! cancelled together with the session.

mod control;
mod telemetry;

pub use control::ControlSession;
pub use telemetry::TelemetrySession;

use std::time::Duration;

use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use da_core::error::ConnectionError;
use da_core::time::unix_timestamp;
use da_protocol::{Envelope, LogLevel, Message, MessageType, Role};

use crate::tunnel::LinkSender;

/// Relay reply to a wrong shared secret
const INVALID_TOKEN: &str = "invalid token";

/// Agent `hello` for `secret`
fn hello(secret: &str) -> Message {
    Message::Hello {
        role: Role::Agent,
        token: Some(secret.to_string()),
    }
}

/// `log` entry from this agent
pub fn agent_log(level: LogLevel, message: impl Into<String>) -> Message {
    Message::Log {
        level,
        source: "agent".to_string(),
        message: message.into(),
        timestamp: unix_timestamp(),
    }
}

/// Send `heartbeat` every `interval` until cancelled or the link goes away
async fn heartbeat_loop(sender: LinkSender, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let heartbeat = Message::Heartbeat { role: Role::Agent };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = sender.send(&heartbeat).await {
                    tracing::debug!("Heartbeat stopped: {}", e);
                    break;
                }
            }
        }
    }
}

/// Surface relay-side rejections.
///
/// A wrong secret ends the session; other errors are only logged.
fn check_relay_feedback(envelope: &Envelope) -> Result<(), ConnectionError> {
    if envelope.kind() != Some(MessageType::Feedback)
        || envelope.get("status").and_then(Value::as_str) != Some("error")
    {
        return Ok(());
    }

    let message = envelope
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if message == INVALID_TOKEN {
        return Err(ConnectionError::AuthenticationFailed(message.to_string()));
    }

    tracing::warn!("Relay rejected a message: {}", message);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_token_feedback_is_fatal() {
        let rejection =
            Envelope::parse(r#"{"type":"feedback","status":"error","message":"invalid token"}"#)
                .unwrap();
        assert!(matches!(
            check_relay_feedback(&rejection),
            Err(ConnectionError::AuthenticationFailed(_))
        ));

        let other_error = Envelope::parse(
            r#"{"type":"feedback","status":"error","message":"handshake not completed"}"#,
        )
        .unwrap();
        assert!(check_relay_feedback(&other_error).is_ok());

        let status = Envelope::parse(r#"{"type":"status","online":true,"timestamp":1.0}"#).unwrap();
        assert!(check_relay_feedback(&status).is_ok());
    }

    #[test]
    fn test_hello_carries_token() {
        let value = serde_json::to_value(hello("s3cret")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "hello", "role": "agent", "token": "s3cret"})
        );
    }
}
