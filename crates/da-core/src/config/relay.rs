//! Relay configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;

/// Environment variable pointing at an alternate relay config file
pub const ENV_RELAY_CONFIG: &str = "DESKAGENT_RELAY_CONFIG";

/// Configuration for the relay daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address to bind the WebSocket server to
    pub bind_address: String,

    /// Secret agents must present in their `hello`.
    ///
    /// Empty means no agent can authenticate.
    pub shared_secret: String,

    /// Minimum time between two accepted commands from one controller
    #[serde(with = "duration_secs")]
    pub rate_limit_interval: Duration,

    /// Per-connection outbound queue depth.
    ///
    /// A member whose queue is full misses the broadcast instead of
    /// stalling it for everyone else.
    pub outbound_queue_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            shared_secret: String::new(),
            rate_limit_interval: Duration::from_secs(2),
            outbound_queue_capacity: 64,
        }
    }
}

impl RelayConfig {
    /// Default location of the relay config file
    pub fn default_path() -> PathBuf {
        super::default_config_dir().join("relay.toml")
    }

    /// Overlay values from the environment.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup(super::ENV_SHARED_SECRET).filter(|s| !s.is_empty()) {
            self.shared_secret = secret;
        }
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.is_empty() {
            return Err(ConfigError::MissingField("bind_address".to_string()));
        }
        if self.outbound_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "outbound_queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
