use crate::config::SupervisorConfig;
use std::time::Duration;

/// Restart policy with bounded exponential backoff
///
/// `restart_count` is the number of consecutive failed restart attempts; a
/// restart that passes its health check resets it to zero.
#[derive(Debug, Clone, Copy)]
pub struct RestartPolicy {
    /// Base delay before the first restart attempt (in seconds)
    pub base_delay_secs: u64,
    /// Maximum delay between restart attempts (in seconds)
    pub max_delay_secs: u64,
    /// Maximum number of consecutive failed restart attempts
    pub max_restarts: u32,
}

impl RestartPolicy {
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self {
            base_delay_secs: config.base_delay_secs,
            max_delay_secs: config.max_delay_secs,
            max_restarts: config.max_restarts,
        }
    }

    /// Delay before the next restart attempt: `min(base * 2^count, max)`
    pub fn delay_for(&self, restart_count: u32) -> Duration {
        let delay_secs = self
            .base_delay_secs
            .saturating_mul(2_u64.saturating_pow(restart_count))
            .min(self.max_delay_secs);
        Duration::from_secs(delay_secs)
    }

    /// Whether another restart attempt is allowed
    pub fn budget_remaining(&self, restart_count: u32) -> bool {
        restart_count < self.max_restarts
    }
}
