use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ExecutionError;
use crate::executor::allocator::WorkspaceLock;
use crate::executor::types::{ExecutionOutput, FailedCheck, Unit};

/// Performs the actual work of a unit.
///
/// The engine calls `execute` once per attempt. Implementations must stay
/// inside the unit's reserved scope (`ctx.workspace`).
#[async_trait]
pub trait UnitExecutor: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(
        &self,
        unit: &Unit,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionOutput, ExecutionError>;
}

/// Per-attempt input handed to a [`UnitExecutor`].
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub run_id: String,
    pub level: usize,
    /// 1-based attempt number
    pub attempt: u32,
    /// Failed checks of the previous attempt; `None` on the first attempt.
    pub prior_failures: Option<Vec<FailedCheck>>,
    /// Outputs of the unit's direct dependencies, keyed by unit id.
    pub dependency_outputs: HashMap<String, ExecutionOutput>,
    pub workspace: WorkspaceLock,
}

impl ExecutionContext {
    pub fn is_retry(&self) -> bool {
        self.prior_failures.is_some()
    }

    pub fn prior_reasons(&self) -> Vec<&str> {
        self.prior_failures
            .iter()
            .flatten()
            .map(|f| f.reason.as_str())
            .collect()
    }
}
