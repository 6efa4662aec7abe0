use std::collections::HashMap;
use std::sync::Arc;

use crate::error::EngineError;
use crate::executor::checks::{build_check, CheckRegistry, ExitCodeCheck};
use crate::executor::graph::Graph;
use crate::executor::traits::UnitCheck;
use crate::executor::types::{CheckpointResult, ExecutionOutput, FailedCheck, Unit};

/// A compiled checkpoint: a named set of independent checks.
#[derive(Clone)]
pub struct Checkpoint {
    pub name: String,
    checks: Vec<Arc<dyn UnitCheck>>,
}

impl std::fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.checks.iter().map(|c| c.name()).collect();
        f.debug_struct("Checkpoint")
            .field("name", &self.name)
            .field("checks", &names)
            .finish()
    }
}

impl Checkpoint {
    pub fn new(name: impl Into<String>, checks: Vec<Arc<dyn UnitCheck>>) -> Self {
        Self {
            name: name.into(),
            checks,
        }
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check; never stops at the first failure.
    pub fn evaluate(&self, unit: &Unit, output: &ExecutionOutput) -> CheckpointResult {
        let failed_checks = self
            .checks
            .iter()
            .filter_map(|check| {
                check
                    .check(unit, output)
                    .err()
                    .map(|reason| FailedCheck::new(check.name(), reason))
            })
            .collect();
        CheckpointResult::from_failures(self.name.clone(), failed_checks)
    }
}

/// Checkpoints for every unit of a graph, compiled before the run.
#[derive(Debug, Clone, Default)]
pub struct CheckpointValidator {
    checkpoints: HashMap<String, Checkpoint>,
}

impl CheckpointValidator {
    /// Compile every unit's checkpoint. Units without checks get an
    /// implicit `exit_code == 0` check.
    pub fn compile(graph: &Graph, registry: &CheckRegistry) -> Result<Self, EngineError> {
        let mut checkpoints = HashMap::with_capacity(graph.len());

        for unit in graph.units() {
            let checks = if unit.checkpoint.checks.is_empty() {
                vec![Arc::new(ExitCodeCheck { expect: 0 }) as Arc<dyn UnitCheck>]
            } else {
                unit.checkpoint
                    .checks
                    .iter()
                    .map(|spec| build_check(spec, registry))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|source| EngineError::InvalidCheckpoint {
                        unit_id: unit.id.clone(),
                        source,
                    })?
            };
            checkpoints.insert(
                unit.id.clone(),
                Checkpoint::new(unit.checkpoint.name.clone(), checks),
            );
        }

        Ok(Self { checkpoints })
    }

    pub fn checkpoint(&self, unit_id: &str) -> Option<&Checkpoint> {
        self.checkpoints.get(unit_id)
    }

    /// Evaluate `unit`'s checkpoint against `output`. Read-only.
    pub fn evaluate(&self, unit: &Unit, output: &ExecutionOutput) -> CheckpointResult {
        match self.checkpoints.get(&unit.id) {
            Some(checkpoint) => checkpoint.evaluate(unit, output),
            None => Checkpoint::new(
                unit.checkpoint.name.clone(),
                vec![Arc::new(ExitCodeCheck { expect: 0 })],
            )
            .evaluate(unit, output),
        }
    }
}
