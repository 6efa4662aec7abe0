use crate::executor::types::{ExecutionOutput, Unit};

/// `Ok(())` when the check passes, otherwise the failure reason.
pub type CheckOutcome = Result<(), String>;

/// One independent, read-only check run against a finished attempt.
pub trait UnitCheck: Send + Sync {
    fn name(&self) -> &str;

    fn check(&self, unit: &Unit, output: &ExecutionOutput) -> CheckOutcome;
}
