use std::time::Duration;

use thiserror::Error;

use super::code::ErrorCode;

/// Errors raised while building or validating the unit graph.
///
/// All of them are fatal and surface before any unit executes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("unit id must not be empty")]
    EmptyUnitId,

    #[error("duplicate unit id: {0}")]
    DuplicateUnitId(String),

    #[error("unknown dependency: unit '{unit_id}' depends on '{missing}'")]
    UnknownDependency { unit_id: String, missing: String },

    #[error("cyclic dependency: {}", .path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("invalid scope pattern '{pattern}' on unit '{unit_id}': {reason}")]
    InvalidScope {
        unit_id: String,
        pattern: String,
        reason: String,
    },
}

/// Raised by the workspace allocator when a unit's scope overlaps a lock
/// that is currently held by another unit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "ScopeConflictError: unit '{unit_id}' pattern '{pattern}' overlaps '{held_pattern}' held by '{held_by}'"
)]
pub struct ScopeConflict {
    pub unit_id: String,
    pub pattern: String,
    pub held_by: String,
    pub held_pattern: String,
}

/// Failures reported by a [`UnitExecutor`](crate::executor::traits::UnitExecutor).
///
/// Every variant is recoverable: the engine turns it into a failed check and
/// hands the unit to the recovery controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("ExecutionError: {0}")]
    Failed(String),

    #[error("ExecutionTimeoutError: no result after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("ExecutionError: executor panicked: {0}")]
    Panicked(String),

    #[error("ExecutionError: io: {0}")]
    Io(String),
}

impl From<std::io::Error> for ExecutionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Errors raised while compiling a checkpoint's check descriptors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckSpecError {
    #[error("invalid regex '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("json pointer must be empty or start with '/': '{0}'")]
    InvalidPointer(String),

    #[error("no check registered under name '{0}'")]
    UnknownNamedCheck(String),
}

/// Top-level engine error. Anything returned here aborts the run before a
/// report exists; per-unit failures are recorded in the report instead.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("invalid checkpoint on unit '{unit_id}': {source}")]
    InvalidCheckpoint {
        unit_id: String,
        #[source]
        source: CheckSpecError,
    },

    #[error("level plan does not match graph: {0}")]
    PlanMismatch(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl EngineError {
    /// Map engine error to the CLI exit code
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Graph(_) | Self::InvalidCheckpoint { .. } | Self::PlanMismatch(_) => {
                ErrorCode::ValidationError
            }
            Self::Runtime(_) => ErrorCode::InternalError,
        }
    }
}
