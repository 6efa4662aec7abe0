use std::time::Duration;

/// Retry pacing plugin
///
/// The attempt budget belongs to the recovery controller; a strategy only
/// decides how long to wait before retry number `attempt` (1-based).
pub trait RetryStrategyPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn next_delay(&self, attempt: u32) -> Duration;
}
