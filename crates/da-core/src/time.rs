//! Time utilities for deskagent
//!
//! Wire timestamps are Unix time in fractional seconds.

use std::time::{SystemTime, UNIX_EPOCH};

/// Get the current Unix timestamp in seconds, with sub-second precision.
///
/// Returns 0.0 if the system clock is set before the Unix epoch.
///
/// # Examples
/// ```
/// use da_core::time::unix_timestamp;
///
/// let now = unix_timestamp();
/// assert!(now > 0.0);
/// ```
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_unix_timestamp_is_positive() {
        assert!(unix_timestamp() > 0.0);
    }

    #[test]
    fn test_unix_timestamp_advances() {
        let before = unix_timestamp();
        std::thread::sleep(Duration::from_millis(10));
        assert!(unix_timestamp() > before);
    }
}
