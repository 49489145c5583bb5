//! Delay schedule for the node's control-connection retries.
//!
//! The node retries forever. By default it waits the same interval before
//! every attempt. Given a cap above that interval, the wait doubles after
//! each failed attempt until it reaches the cap, and drops back to the
//! base interval once a connection succeeds.

use std::time::Duration;

/// Wait before each attempt when nothing else is configured.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Wait before the first retry and after every successful session.
    pub base: Duration,
    /// Longest wait. Equal to `base` for a fixed schedule.
    pub cap: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectConfig {
    /// Retry at a constant interval.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base: delay,
            cap: delay,
        }
    }

    /// Start at `base` and double per failure up to `cap`.
    ///
    /// A `cap` at or below `base` gives the fixed schedule.
    pub fn capped(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap: cap.max(base),
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.base == self.cap
    }

    /// Wait to use after an attempt that waited `current`.
    pub fn next(&self, current: Duration) -> Duration {
        if self.is_fixed() {
            return self.base;
        }
        current.saturating_mul(2).min(self.cap).max(self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(config: ReconnectConfig, attempts: usize) -> Vec<u64> {
        let mut delay = config.base;
        let mut waits = Vec::new();
        for _ in 0..attempts {
            waits.push(delay.as_secs());
            delay = config.next(delay);
        }
        waits
    }

    #[test]
    fn default_is_a_fixed_five_seconds() {
        let config = ReconnectConfig::default();
        assert!(config.is_fixed());
        assert_eq!(schedule(config, 4), vec![5, 5, 5, 5]);
    }

    #[test]
    fn capped_schedule_doubles_then_holds() {
        let config = ReconnectConfig::capped(Duration::from_secs(5), Duration::from_secs(30));
        assert_eq!(schedule(config, 6), vec![5, 10, 20, 30, 30, 30]);
    }

    #[test]
    fn cap_below_base_is_fixed() {
        let config = ReconnectConfig::capped(Duration::from_secs(5), Duration::from_secs(2));
        assert_eq!(config, ReconnectConfig::fixed(Duration::from_secs(5)));
    }
}
