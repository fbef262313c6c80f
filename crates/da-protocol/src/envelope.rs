//! Inbound message envelope
//!
//! The relay forwards most messages verbatim, so it never re-serializes what
//! it receives. An [`Envelope`] keeps the received text alongside the parsed
//! object and exposes just the fields routing and the handshake need.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::ProtocolError;
use crate::message::{MessageType, Role};

/// A received message: the parsed object plus its received text
#[derive(Debug, Clone)]
pub struct Envelope {
    kind: Option<MessageType>,
    body: Map<String, Value>,
    raw: Arc<str>,
}

impl Envelope {
    /// Parse a text frame.
    ///
    /// A missing or unrecognized `type` is not an error; [`Envelope::kind`]
    /// returns `None` and the caller decides what to do with it.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let body = match value {
            Value::Object(map) => map,
            Value::Array(_) => return Err(ProtocolError::NotAnObject("array")),
            Value::String(_) => return Err(ProtocolError::NotAnObject("string")),
            Value::Number(_) => return Err(ProtocolError::NotAnObject("number")),
            Value::Bool(_) => return Err(ProtocolError::NotAnObject("bool")),
            Value::Null => return Err(ProtocolError::NotAnObject("null")),
        };

        let kind = body
            .get("type")
            .and_then(Value::as_str)
            .and_then(MessageType::from_wire);

        Ok(Self {
            kind,
            body,
            raw: Arc::from(text),
        })
    }

    /// Recognized message type, if any
    pub fn kind(&self) -> Option<MessageType> {
        self.kind
    }

    /// The `type` field exactly as sent
    pub fn type_name(&self) -> Option<&str> {
        self.str_field("type")
    }

    /// The raw `role` hint exactly as sent
    pub fn role_hint(&self) -> Option<&str> {
        self.str_field("role")
    }

    /// The `role` hint parsed into a [`Role`]
    pub fn role(&self) -> Option<Role> {
        self.role_hint().and_then(Role::from_wire)
    }

    /// Shared secret supplied with a `hello`
    pub fn token(&self) -> Option<&str> {
        self.str_field("token")
    }

    /// Action requested by a `command`
    pub fn action(&self) -> Option<&str> {
        self.str_field("action")
    }

    /// Look up any top-level field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// The full parsed object
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// The received frame text, shared for zero-copy fan-out
    pub fn raw(&self) -> &Arc<str> {
        &self.raw
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_keeps_raw_text() {
        let text = r#"{"type":"command","action":"shutdown_with_time","minutes":10,"extra":[1,2]}"#;
        let envelope = Envelope::parse(text).unwrap();

        assert_eq!(envelope.kind(), Some(MessageType::Command));
        assert_eq!(envelope.action(), Some("shutdown_with_time"));
        assert_eq!(envelope.get("minutes").and_then(Value::as_i64), Some(10));
        assert_eq!(envelope.raw().as_ref(), text);
    }

    #[test]
    fn test_parse_hello_fields() {
        let envelope = Envelope::parse(r#"{"type":"hello","role":"agent","token":"s3cret"}"#).unwrap();
        assert_eq!(envelope.kind(), Some(MessageType::Hello));
        assert_eq!(envelope.role(), Some(Role::Agent));
        assert_eq!(envelope.token(), Some("s3cret"));
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        let envelope = Envelope::parse(r#"{"type":"selfdestruct"}"#).unwrap();
        assert_eq!(envelope.kind(), None);
        assert_eq!(envelope.type_name(), Some("selfdestruct"));

        let untyped = Envelope::parse(r#"{"action":"reboot"}"#).unwrap();
        assert_eq!(untyped.kind(), None);
        assert_eq!(untyped.type_name(), None);
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            Envelope::parse("[1,2,3]"),
            Err(ProtocolError::NotAnObject("array"))
        ));
        assert!(matches!(
            Envelope::parse("not json"),
            Err(ProtocolError::Json(_))
        ));
    }
}
