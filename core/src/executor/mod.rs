//! Dependency-gated execution of unit graphs
//!
//! This module turns unit specifications into a validated, levelled plan and
//! runs it:
//! - Graph construction with duplicate and unknown-dependency checks
//! - Cycle detection with the full cycle path
//! - Minimum-level layering for parallel execution
//! - Workspace locks so concurrent units never share a path
//! - Checkpoint gating with bounded recovery
//! - One run-level report
//!
//! # Architecture
//!
//! ```text
//! Vec<UnitSpec>
//!   ↓
//! Graph::build()                → arena of units + adjacency lists
//!   ↓
//! validate_and_layer()          → LevelPlan { levels, warnings }
//!   ↓
//! ExecutionEngine::run()
//!   ├─ WorkspaceAllocator::acquire_scoped()   (per unit, in the control task)
//!   ├─ UnitExecutor::execute()                (per unit, own tokio task)
//!   ├─ CheckpointValidator::evaluate()
//!   └─ RecoveryController::attempt_recovery() (while budget remains)
//!   ↓
//! RunReport
//! ```

pub mod allocator;
pub mod checkpoint;
pub mod checks;
mod engine;
pub mod graph;
pub mod output;
mod progress;
pub mod recovery;
pub mod report;
mod scheduler;
pub mod scope;
pub mod traits;
pub mod types;

pub use allocator::{WorkspaceAllocator, WorkspaceGuard, WorkspaceLock};
pub use checkpoint::{Checkpoint, CheckpointValidator};
pub use checks::{build_check, CheckRegistry};
pub use engine::{ExecutionEngine, ExecutionEngineBuilder};
pub use graph::{validate_and_layer, ExecutionLevel, Graph, LevelPlan, ScopeOverlapWarning};
pub use output::EventEmitter;
pub use progress::ProgressMonitor;
pub use recovery::{Attempt, AttemptOutcome, RecoveryController};
pub use report::{RunRecorder, RunReport, RunSummary, UnitReport};
pub use scheduler::execute_level_parallel;
pub use scope::ScopePattern;
pub use types::{
    AttemptRecord, CheckSpec, CheckpointResult, CheckpointSpec, ExecutionConfig, ExecutionOutput,
    FailedCheck, OutputConfig, RetryConfig, Unit, UnitSpec, UnitState,
};
