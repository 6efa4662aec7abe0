use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::check::CheckpointSpec;
use crate::executor::scope::ScopePattern;

/// Declarative description of one unit of work, as read from a unit file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub id: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, alias = "declared_dependencies", alias = "depends_on")]
    pub dependencies: Vec<String>,

    /// Path patterns this unit may read or write.
    #[serde(default)]
    pub scope: Vec<String>,

    #[serde(default)]
    pub checkpoint: CheckpointSpec,

    /// Payload for executors that run shell commands.
    #[serde(default)]
    pub command: Option<String>,

    /// Overrides `executor.max_attempts` for this unit.
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Overrides `executor.per_unit_timeout_seconds` for this unit.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl UnitSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            dependencies: Vec::new(),
            scope: Vec::new(),
            checkpoint: CheckpointSpec::default(),
            command: None,
            max_attempts: None,
            timeout_secs: None,
        }
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_scope<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: CheckpointSpec) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// Lifecycle of a unit within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
    Blocked,
}

impl UnitState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitState::Succeeded | UnitState::Blocked)
    }

    /// Whether `self -> to` is a legal lifecycle step.
    pub fn can_transition(self, to: UnitState) -> bool {
        use UnitState::*;
        matches!(
            (self, to),
            (Pending, Ready)
                | (Pending, Blocked)
                | (Ready, Running)
                | (Ready, Blocked)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, Blocked)
                | (Failed, Running)
                | (Failed, Blocked)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnitState::Pending => "pending",
            UnitState::Ready => "ready",
            UnitState::Running => "running",
            UnitState::Succeeded => "succeeded",
            UnitState::Failed => "failed",
            UnitState::Blocked => "blocked",
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit as the engine sees it: a validated `UnitSpec` plus run state.
#[derive(Debug, Clone)]
pub struct Unit {
    pub id: String,
    pub description: String,
    pub dependencies: Vec<String>,
    pub scope: Vec<ScopePattern>,
    pub checkpoint: CheckpointSpec,
    pub command: Option<String>,
    pub max_attempts: Option<u32>,
    pub timeout: Option<Duration>,
    pub state: UnitState,
    pub attempt_count: u32,
}

impl Unit {
    /// Move to `to`, logging illegal steps. Debug builds assert on them.
    pub fn set_state(&mut self, to: UnitState) {
        let from = self.state;
        debug_assert!(
            from.can_transition(to),
            "illegal transition for unit '{}': {from} -> {to}",
            self.id
        );
        if !from.can_transition(to) {
            tracing::error!(unit_id = %self.id, %from, %to, "illegal unit state transition");
        }
        tracing::trace!(unit_id = %self.id, %from, %to, "unit state transition");
        self.state = to;
    }

    pub fn scope_patterns(&self) -> impl Iterator<Item = &str> {
        self.scope.iter().map(|p| p.as_str())
    }
}
