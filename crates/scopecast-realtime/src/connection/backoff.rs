//! Exponential reconnect backoff.

use std::time::Duration;

use scopecast_core::config::realtime::RealtimeConfig;

/// Reconnect schedule: attempt `n` waits `base * 2^(n-1)`, for at most
/// `max_attempts` attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt.
    pub base_delay: Duration,
    /// Attempts before giving up.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Creates a policy.
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Builds the policy from configuration.
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self::new(config.reconnect_base_delay(), config.max_reconnect_attempts)
    }

    /// Delay before attempt `attempt` (1-based), or `None` past the bound.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor))
    }

    /// Every delay of the schedule, in order.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_attempts)
            .filter_map(|attempt| self.delay_for(attempt))
            .collect()
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&RealtimeConfig::default())
    }
}
