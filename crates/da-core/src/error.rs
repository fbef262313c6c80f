//! Core error types for deskagent

use da_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the deskagent components
#[derive(Error, Debug)]
pub enum DaError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}

/// Connection-related errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The relay refused our shared secret
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Could not reach the relay
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// Established connection dropped
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Connect attempt did not finish in time
    #[error("Connection to {0} timed out")]
    Timeout(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}
