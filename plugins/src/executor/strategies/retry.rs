use gantry_core::api::{RetryConfig, RetryStrategyPlugin};
use std::time::Duration;

/// Retries straight away.
pub struct ImmediateRetryPlugin;

pub struct ExponentialBackoffPlugin {
    config: RetryConfig,
}

pub struct LinearRetryPlugin {
    config: RetryConfig,
}

impl ExponentialBackoffPlugin {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl LinearRetryPlugin {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl RetryStrategyPlugin for ImmediateRetryPlugin {
    fn name(&self) -> &str {
        "immediate"
    }

    fn next_delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

impl RetryStrategyPlugin for ExponentialBackoffPlugin {
    fn name(&self) -> &str {
        "exponential-backoff"
    }

    // base, 2*base, 4*base, ... capped at max_delay_ms
    fn next_delay(&self, attempt: u32) -> Duration {
        let exp = 1u64 << attempt.saturating_sub(1).min(30);
        let delay = self.config.base_delay_ms.saturating_mul(exp);
        Duration::from_millis(delay.min(self.config.max_delay_ms))
    }
}

impl RetryStrategyPlugin for LinearRetryPlugin {
    fn name(&self) -> &str {
        "linear"
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        let multiplier = attempt.max(1) as u64;
        let delay = self.config.base_delay_ms.saturating_mul(multiplier);
        Duration::from_millis(delay.min(self.config.max_delay_ms))
    }
}
