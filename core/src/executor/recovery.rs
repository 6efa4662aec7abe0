use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;

use crate::error::ExecutionError;
use crate::executor::checkpoint::CheckpointValidator;
use crate::executor::traits::{ExecutionContext, UnitExecutor};
use crate::executor::types::{
    AttemptRecord, CheckpointResult, ExecutionOutput, FailedCheck, Unit, UnitState,
};

/// Runs one execution of a unit and evaluates its checkpoint.
pub struct Attempt {
    executor: Arc<dyn UnitExecutor>,
    validator: Arc<CheckpointValidator>,
    context: ExecutionContext,
    timeout: Option<Duration>,
}

/// What a single attempt produced.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub result: CheckpointResult,
    /// `None` when the executor errored, timed out or panicked
    pub output: Option<ExecutionOutput>,
    pub duration_ms: u64,
}

impl AttemptOutcome {
    pub fn record(&self, attempt: u32) -> AttemptRecord {
        AttemptRecord {
            attempt,
            duration_ms: self.duration_ms,
            passed: self.result.passed,
            failed_checks: self.result.failed_checks.clone(),
        }
    }
}

impl Attempt {
    pub fn new(
        executor: Arc<dyn UnitExecutor>,
        validator: Arc<CheckpointValidator>,
        context: ExecutionContext,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            executor,
            validator,
            context,
            timeout,
        }
    }

    /// Execute `unit` once as attempt `unit.attempt_count`.
    ///
    /// Executor errors, timeouts and panics all come back as a failed
    /// `execution` check; nothing here is fatal to the run.
    pub async fn run(&self, unit: &Unit, prior_failures: Option<Vec<FailedCheck>>) -> AttemptOutcome {
        let ctx = ExecutionContext {
            attempt: unit.attempt_count,
            prior_failures,
            ..self.context.clone()
        };

        let started = Instant::now();
        let executed = self.execute_guarded(unit, &ctx).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match executed {
            Ok(output) => AttemptOutcome {
                result: self.validator.evaluate(unit, &output),
                output: Some(output),
                duration_ms,
            },
            Err(err) => {
                tracing::warn!(
                    unit_id = %unit.id,
                    attempt = unit.attempt_count,
                    error = %err,
                    "unit execution failed"
                );
                AttemptOutcome {
                    result: CheckpointResult::from_failures(
                        unit.checkpoint.name.clone(),
                        vec![FailedCheck::from_execution_error(&err)],
                    ),
                    output: None,
                    duration_ms,
                }
            }
        }
    }

    async fn execute_guarded(
        &self,
        unit: &Unit,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionOutput, ExecutionError> {
        let call = AssertUnwindSafe(self.executor.execute(unit, ctx)).catch_unwind();

        let caught = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ExecutionError::Timeout(limit))?,
            None => call.await,
        };

        caught.unwrap_or_else(|payload| Err(ExecutionError::Panicked(panic_message(payload))))
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Bounded re-execution of failed units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryController {
    max_attempts: u32,
}

impl RecoveryController {
    /// `max_attempts` counts every attempt including the first; `0` is
    /// treated as `1` (run once, never retry).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn has_budget(&self, unit: &Unit) -> bool {
        unit.attempt_count < self.max_attempts
    }

    /// Move a `Running` unit to its post-evaluation state.
    pub fn settle(&self, unit: &mut Unit, result: &CheckpointResult) {
        let next = if result.passed {
            UnitState::Succeeded
        } else if self.has_budget(unit) {
            UnitState::Failed
        } else {
            UnitState::Blocked
        };
        unit.set_state(next);
    }

    /// Retry a `Failed` unit once, feeding it the previous failures.
    ///
    /// Leaves the unit `Succeeded`, `Failed` (budget remains) or `Blocked`.
    pub async fn attempt_recovery(
        &self,
        unit: &mut Unit,
        previous: &CheckpointResult,
        attempt: &Attempt,
    ) -> AttemptOutcome {
        debug_assert_eq!(unit.state, UnitState::Failed);

        unit.set_state(UnitState::Running);
        unit.attempt_count += 1;
        tracing::info!(
            unit_id = %unit.id,
            attempt = unit.attempt_count,
            max_attempts = self.max_attempts,
            "retrying unit"
        );

        let outcome = attempt
            .run(unit, Some(previous.failed_checks.clone()))
            .await;
        self.settle(unit, &outcome.result);
        outcome
    }
}
