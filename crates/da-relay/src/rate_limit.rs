//! Per-connection command cooldown
//!
//! The cooldown runs from the last *accepted* command. A rejected attempt
//! leaves the stored timestamp alone, so hammering the relay does not push
//! the next allowed command further out.

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::registry::ConnectionId;

/// Default minimum interval between accepted commands
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// Reply sent to a controller whose command was rate limited
pub const RATE_LIMITED: &str = "please wait a moment before sending another command";

/// Minimum-interval limiter keyed by connection
pub struct RateLimiter {
    interval: Duration,
    last_accepted: DashMap<ConnectionId, Instant>,
}

impl RateLimiter {
    /// Create a limiter with the given interval
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: DashMap::new(),
        }
    }

    /// Configured interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Decide whether a command arriving at `now` may pass.
    ///
    /// Check and update happen under the entry lock, so two racing calls for
    /// the same connection cannot both pass inside one interval.
    pub fn allow(&self, id: ConnectionId, now: Instant) -> bool {
        match self.last_accepted.entry(id) {
            Entry::Occupied(mut entry) => {
                if now.saturating_duration_since(*entry.get()) < self.interval {
                    false
                } else {
                    entry.insert(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// When the last command from `id` was accepted
    pub fn last_accepted(&self, id: ConnectionId) -> Option<Instant> {
        self.last_accepted.get(&id).map(|r| *r)
    }

    /// Drop the entry of a closed connection
    pub fn forget(&self, id: ConnectionId) {
        self.last_accepted.remove(&id);
    }

    /// Number of tracked connections
    pub fn len(&self) -> usize {
        self.last_accepted.len()
    }

    /// Check if no connection is tracked
    pub fn is_empty(&self) -> bool {
        self.last_accepted.is_empty()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_does_not_reset_cooldown() {
        let limiter = RateLimiter::default();
        let id = ConnectionId(1);
        let t0 = Instant::now();

        assert!(limiter.allow(id, t0));
        assert!(!limiter.allow(id, t0 + Duration::from_millis(1900)));
        assert_eq!(limiter.last_accepted(id), Some(t0));

        // Judged against t0, not against the rejected attempt at 1.9s
        assert!(limiter.allow(id, t0 + Duration::from_secs(2)));
        assert_eq!(limiter.last_accepted(id), Some(t0 + Duration::from_secs(2)));
    }

    #[test]
    fn test_connections_are_independent() {
        let limiter = RateLimiter::default();
        let t0 = Instant::now();

        assert!(limiter.allow(ConnectionId(1), t0));
        assert!(limiter.allow(ConnectionId(2), t0 + Duration::from_millis(100)));
        assert!(!limiter.allow(ConnectionId(1), t0 + Duration::from_millis(200)));
    }

    #[test]
    fn test_forget_clears_entry() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        let id = ConnectionId(7);
        let t0 = Instant::now();

        assert!(limiter.allow(id, t0));
        limiter.forget(id);
        assert!(limiter.is_empty());
        assert!(limiter.allow(id, t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_zero_interval_always_allows() {
        let limiter = RateLimiter::new(Duration::ZERO);
        let id = ConnectionId(3);
        let t0 = Instant::now();
        assert!(limiter.allow(id, t0));
        assert!(limiter.allow(id, t0));
    }
}
