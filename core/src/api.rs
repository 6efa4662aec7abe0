//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `gantry_core::api` instead of reaching into internal modules.

pub use crate::config::{load, load_default, AppConfig, CommandConfig, LoggingConfig};
pub use crate::error::{
    CheckSpecError, CliError, EngineError, ErrorCode, ExecutionError, GraphError, InputError,
    ScopeConflict,
};
pub use crate::executor::traits::{
    CheckOutcome, ExecutionContext, OutputRendererPlugin, RenderEvent, RetryStrategyPlugin,
    UnitCheck, UnitExecutor,
};
pub use crate::executor::{
    validate_and_layer, CheckRegistry, CheckSpec, CheckpointResult, CheckpointSpec,
    CheckpointValidator, ExecutionConfig, ExecutionEngine, ExecutionLevel, ExecutionOutput,
    FailedCheck, Graph, LevelPlan, OutputConfig, RetryConfig, RunReport, RunSummary,
    ScopeOverlapWarning, Unit, UnitReport, UnitSpec, UnitState, WorkspaceAllocator,
    WorkspaceLock,
};
pub use crate::input::{load_unit_file, UnitFile};
pub use crate::util::generate_run_id;
