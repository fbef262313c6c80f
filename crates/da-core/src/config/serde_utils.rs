//! Serde helpers for configuration files

/// `Duration` as seconds in TOML.
///
/// Whole durations are written as integers (`heartbeat_interval = 5`).
/// Fractional values such as `rate_limit_interval = 0.5` are accepted and
/// written back as floats. Negative or non-finite values are rejected.
///
/// ```ignore
/// #[serde(with = "da_core::config::serde_utils::duration_secs")]
/// heartbeat_interval: Duration,
/// ```
pub mod duration_secs {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Write whole seconds as an integer, anything else as a float
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_nanos() == 0 {
            serializer.serialize_u64(duration.as_secs())
        } else {
            serializer.serialize_f64(duration.as_secs_f64())
        }
    }

    /// Read an integer or fractional number of seconds
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|_| D::Error::custom(format!("invalid duration: {} seconds", secs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Intervals {
        #[serde(with = "duration_secs")]
        heartbeat_interval: Duration,
        #[serde(with = "duration_secs")]
        rate_limit_interval: Duration,
    }

    #[test]
    fn test_intervals_round_trip_through_toml() {
        let intervals = Intervals {
            heartbeat_interval: Duration::from_secs(5),
            rate_limit_interval: Duration::from_millis(500),
        };

        let text = toml::to_string(&intervals).unwrap();
        assert!(text.contains("heartbeat_interval = 5\n"));
        assert!(text.contains("rate_limit_interval = 0.5\n"));

        let parsed: Intervals = toml::from_str(&text).unwrap();
        assert_eq!(parsed, intervals);
    }

    #[test]
    fn test_negative_interval_is_rejected() {
        let result: Result<Intervals, _> =
            toml::from_str("heartbeat_interval = -3\nrate_limit_interval = 2");
        assert!(result.is_err());
    }
}
