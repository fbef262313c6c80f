//! Protocol error types

use thiserror::Error;

/// Errors that can occur while decoding or encoding messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Payload was not valid JSON
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload was valid JSON but not an object
    #[error("Message must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}
