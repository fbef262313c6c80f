//! Configuration management for deskagent

mod agent;
mod relay;
pub mod serde_utils;

pub use agent::{AgentConfig, BackoffConfig, ENV_AGENT_CONFIG, ENV_RELAY_URL, ENV_TELEMETRY_URL};
pub use relay::{RelayConfig, ENV_RELAY_CONFIG};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Environment variable holding the shared agent secret (relay and agent)
pub const ENV_SHARED_SECRET: &str = "AGENT_TOKEN";

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("deskagent")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to `T::default()`.
///
/// A file that exists but fails to parse is an error rather than a silent
/// fallback: running with a half-applied config is worse than not starting.
pub fn load_or_default<T>(path: &Path) -> Result<T, ConfigError>
where
    T: serde::de::DeserializeOwned + Default,
{
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!("No config at {:?}, using defaults", path);
        Ok(T::default())
    }
}
