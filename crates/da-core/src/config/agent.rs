//! Agent configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;

/// Environment variable pointing at an alternate agent config file
pub const ENV_AGENT_CONFIG: &str = "DESKAGENT_AGENT_CONFIG";

/// Environment variable overriding the control channel URL
pub const ENV_RELAY_URL: &str = "PUBLIC_WS_URL";

/// Environment variable overriding the telemetry channel URL
pub const ENV_TELEMETRY_URL: &str = "PUBLIC_WS_URL_STATUS";

/// Configuration for the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// WebSocket URL of the relay's control channel
    pub relay_url: String,

    /// WebSocket URL of the relay's telemetry channel.
    ///
    /// Telemetry reporting is disabled when unset.
    pub telemetry_url: Option<String>,

    /// Secret presented in the agent `hello`
    pub shared_secret: String,

    /// Heartbeat period on the control channel
    #[serde(with = "duration_secs")]
    pub heartbeat_interval: Duration,

    /// Heartbeat period on the telemetry channel
    #[serde(with = "duration_secs")]
    pub telemetry_heartbeat_interval: Duration,

    /// Period between telemetry samples
    #[serde(with = "duration_secs")]
    pub telemetry_interval: Duration,

    /// Delay between reconnect attempts
    pub backoff: BackoffConfig,

    /// Connection timeout
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Extra or replacement fixed actions (action name -> command line)
    pub actions: BTreeMap<String, String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://localhost:8000/ws/control/".to_string(),
            telemetry_url: None,
            shared_secret: String::new(),
            heartbeat_interval: Duration::from_secs(5),
            telemetry_heartbeat_interval: Duration::from_secs(3),
            telemetry_interval: Duration::from_secs(3),
            backoff: BackoffConfig::default(),
            connect_timeout: Duration::from_secs(10),
            actions: BTreeMap::new(),
        }
    }
}

impl AgentConfig {
    /// Default location of the agent config file
    pub fn default_path() -> PathBuf {
        super::default_config_dir().join("agent.toml")
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
        if let Some(url) = lookup(ENV_RELAY_URL).filter(|s| !s.is_empty()) {
            self.relay_url = url;
        }
        if let Some(url) = lookup(ENV_TELEMETRY_URL).filter(|s| !s.is_empty()) {
            self.telemetry_url = Some(url);
        }
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shared_secret.is_empty() {
            return Err(ConfigError::MissingField("shared_secret".to_string()));
        }

        validate_ws_url("relay_url", &self.relay_url)?;
        if let Some(url) = &self.telemetry_url {
            validate_ws_url("telemetry_url", url)?;
        }

        for (name, value) in [
            ("heartbeat_interval", self.heartbeat_interval),
            ("telemetry_heartbeat_interval", self.telemetry_heartbeat_interval),
            ("telemetry_interval", self.telemetry_interval),
            ("backoff.initial", self.backoff.initial),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
            }
        }

        Ok(())
    }
}

fn validate_ws_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{} must be a ws:// or wss:// URL, got {:?}",
            field, url
        )))
    }
}

/// Reconnect backoff configuration.
///
/// The defaults give a fixed 5 second delay; raising `multiplier` turns it
/// into an exponential backoff capped at `max`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Initial delay
    #[serde(with = "duration_secs")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_secs")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(5),
            max: Duration::from_secs(5),
            multiplier: 1.0,
            jitter: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid_config() -> AgentConfig {
        AgentConfig {
            shared_secret: "s3cret".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_need_a_secret() {
        let config = AgentConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField(field)) if field == "shared_secret"
        ));
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("AGENT_TOKEN", "env-secret"),
            ("PUBLIC_WS_URL", "wss://relay.example/ws/control/"),
            ("PUBLIC_WS_URL_STATUS", "wss://relay.example/ws/pc_info/"),
        ]
        .into_iter()
        .collect();

        let mut config = AgentConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.shared_secret, "env-secret");
        assert_eq!(config.relay_url, "wss://relay.example/ws/control/");
        assert_eq!(
            config.telemetry_url.as_deref(),
            Some("wss://relay.example/ws/pc_info/")
        );
    }

    #[test]
    fn test_rejects_http_url() {
        let config = AgentConfig {
            relay_url: "http://relay.example".to_string(),
            ..valid_config()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let config = AgentConfig {
            heartbeat_interval: Duration::ZERO,
            ..valid_config()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_actions_from_toml() {
        let config: AgentConfig = toml::from_str(
            r#"
            shared_secret = "s3cret"

            [actions]
            lock = "loginctl lock-session"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.actions.get("lock").map(String::as_str),
            Some("loginctl lock-session")
        );
        assert_eq!(config.backoff.initial, Duration::from_secs(5));
    }
}
