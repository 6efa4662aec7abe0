use async_trait::async_trait;
use gantry_core::api::{ExecutionContext, ExecutionError, ExecutionOutput, Unit, UnitExecutor};

/// Succeeds every unit without running anything.
///
/// Checks still run against the synthetic output, so a dry run exercises the
/// plan, the allocator and the default `exit_code` checkpoint.
#[derive(Debug, Default)]
pub struct DryRunExecutor;

impl DryRunExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UnitExecutor for DryRunExecutor {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn execute(
        &self,
        unit: &Unit,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionOutput, ExecutionError> {
        tracing::info!(
            unit_id = %unit.id,
            level = ctx.level,
            command = unit.command.as_deref().unwrap_or("<none>"),
            "dry run: skipping execution"
        );
        let mut output = ExecutionOutput::success(format!("[dry-run] {}", unit.id));
        output.metadata = serde_json::json!({ "dry_run": true });
        Ok(output)
    }
}
