use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Executor configuration (`[executor]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Total attempts per unit, first attempt included. `0` behaves like `1`:
    /// the unit runs once and a checkpoint miss blocks it.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Per-attempt timeout. Unset means no timeout.
    #[serde(default)]
    pub per_unit_timeout_seconds: Option<u64>,

    /// Stop the whole run once any unit ends `Blocked`.
    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,

    /// Upper bound on units running at once inside a level. `0` = no bound.
    #[serde(default)]
    pub max_parallel: usize,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            per_unit_timeout_seconds: None,
            fail_fast: default_fail_fast(),
            max_parallel: 0,
            retry: RetryConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl ExecutionConfig {
    /// `0` means no timeout, as it does for the CLI flag and env override.
    pub fn unit_timeout(&self) -> Option<Duration> {
        self.per_unit_timeout_seconds
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_fail_fast() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_format")]
    pub format: String,
    #[serde(default)]
    pub pretty_print: bool,
    #[serde(default)]
    pub ascii_only: bool,
    #[serde(default)]
    pub progress_bar: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_output_format(),
            pretty_print: false,
            ascii_only: false,
            progress_bar: false,
        }
    }
}

fn default_output_format() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_strategy")]
    pub strategy: String,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: default_retry_strategy(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_retry_strategy() -> String {
    "exponential-backoff".to_string()
}
