use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, ScopeConflict};

/// What an executor hands back for one attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    /// Exit code (0 = success, non-zero = failure)
    pub exit_code: i32,

    /// Captured stdout (may be truncated)
    pub stdout: String,

    /// Captured stderr (may be truncated)
    pub stderr: String,

    /// Execution duration in milliseconds
    pub duration_ms: u64,

    /// Directory the work ran in; relative `file_exists` checks resolve here.
    pub workdir: Option<PathBuf>,

    /// Free-form executor data.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl ExecutionOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }
}

/// A single failed check: which check and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedCheck {
    pub check: String,
    pub reason: String,
}

impl FailedCheck {
    pub fn new(check: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            reason: reason.into(),
        }
    }

    /// Executor errors count as a failed `execution` check.
    pub fn from_execution_error(err: &ExecutionError) -> Self {
        Self::new("execution", err.to_string())
    }

    pub fn from_scope_conflict(conflict: &ScopeConflict) -> Self {
        Self::new("workspace", conflict.to_string())
    }

    pub fn blocked_by(dependency: &str) -> Self {
        Self::new(
            "dependency",
            format!("dependency '{dependency}' ended blocked"),
        )
    }
}

/// Verdict of one checkpoint evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointResult {
    pub checkpoint: String,
    pub passed: bool,
    pub failed_checks: Vec<FailedCheck>,
}

impl CheckpointResult {
    pub fn from_failures(checkpoint: impl Into<String>, failed_checks: Vec<FailedCheck>) -> Self {
        Self {
            checkpoint: checkpoint.into(),
            passed: failed_checks.is_empty(),
            failed_checks,
        }
    }

    pub fn reasons(&self) -> impl Iterator<Item = &str> {
        self.failed_checks.iter().map(|f| f.reason.as_str())
    }
}

/// History entry for one execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub duration_ms: u64,
    pub passed: bool,
    pub failed_checks: Vec<FailedCheck>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn checkpoint_passes_only_without_failures() {
        assert!(CheckpointResult::from_failures("c", Vec::new()).passed);
        let failed = CheckpointResult::from_failures("c", vec![FailedCheck::new("x", "nope")]);
        assert!(!failed.passed);
        assert_eq!(failed.reasons().collect::<Vec<_>>(), vec!["nope"]);
    }

    #[test]
    fn timeout_becomes_execution_check() {
        let f = FailedCheck::from_execution_error(&ExecutionError::Timeout(Duration::from_secs(2)));
        assert_eq!(f.check, "execution");
        assert!(f.reason.contains("ExecutionTimeoutError"));
    }
}
