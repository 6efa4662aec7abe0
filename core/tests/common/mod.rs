#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gantry_core::api::{
    validate_and_layer, CheckOutcome, ExecutionConfig, ExecutionContext, ExecutionError,
    ExecutionOutput, FailedCheck, Graph, LevelPlan, OutputRendererPlugin, RenderEvent, Unit,
    UnitCheck, UnitExecutor, UnitSpec,
};
use tokio::sync::Barrier;

/// How a scripted unit behaves on each attempt.
#[derive(Clone)]
pub enum Behavior {
    Succeed,
    /// Exit with this code on every attempt.
    ExitCode(i32),
    /// Exit 1 until `attempt >= n`, then exit 0.
    FailUntil(u32),
    Error(String),
    Sleep(Duration),
    Panic(String),
    /// Wait until every party sharing the barrier has arrived.
    Rendezvous(Arc<Barrier>),
}

/// One recorded executor call.
#[derive(Debug, Clone)]
pub struct Call {
    pub unit_id: String,
    pub attempt: u32,
    pub prior_failures: Option<Vec<FailedCheck>>,
    pub dependencies: Vec<String>,
}

/// Executor whose per-unit behavior is fixed up front. Unknown units succeed.
#[derive(Default)]
pub struct ScriptedExecutor {
    behaviors: HashMap<String, Behavior>,
    calls: Mutex<Vec<Call>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, unit_id: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(unit_id.to_string(), behavior);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, unit_id: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.unit_id == unit_id)
            .collect()
    }

    pub fn was_called(&self, unit_id: &str) -> bool {
        !self.calls_for(unit_id).is_empty()
    }

    /// Highest number of simultaneously running executions seen.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl UnitExecutor for ScriptedExecutor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(
        &self,
        unit: &Unit,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionOutput, ExecutionError> {
        let mut dependencies: Vec<String> = ctx.dependency_outputs.keys().cloned().collect();
        dependencies.sort();
        self.calls.lock().unwrap().push(Call {
            unit_id: unit.id.clone(),
            attempt: ctx.attempt,
            prior_failures: ctx.prior_failures.clone(),
            dependencies,
        });

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _running = RunningGuard(&self.running);

        let behavior = self
            .behaviors
            .get(&unit.id)
            .cloned()
            .unwrap_or(Behavior::Succeed);

        match behavior {
            Behavior::Succeed => Ok(ExecutionOutput::success(format!("{} done", unit.id))),
            Behavior::ExitCode(code) => Ok(ExecutionOutput::default().with_exit_code(code)),
            Behavior::FailUntil(n) => {
                let code = if ctx.attempt >= n { 0 } else { 1 };
                Ok(ExecutionOutput::success(format!("attempt {}", ctx.attempt)).with_exit_code(code))
            }
            Behavior::Error(msg) => Err(ExecutionError::Failed(msg)),
            Behavior::Sleep(d) => {
                tokio::time::sleep(d).await;
                Ok(ExecutionOutput::success("slept"))
            }
            Behavior::Panic(msg) => panic!("{msg}"),
            Behavior::Rendezvous(barrier) => {
                barrier.wait().await;
                Ok(ExecutionOutput::success("met"))
            }
        }
    }
}

/// A registered check with a fixed verdict.
pub struct StaticCheck {
    pub name: String,
    pub failure: Option<String>,
}

impl StaticCheck {
    pub fn failing(name: &str, reason: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            failure: Some(reason.to_string()),
        })
    }
}

impl UnitCheck for StaticCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, _unit: &Unit, _output: &ExecutionOutput) -> CheckOutcome {
        match &self.failure {
            Some(reason) => Err(reason.clone()),
            None => Ok(()),
        }
    }
}

/// Renderer that keeps every event.
#[derive(Default)]
pub struct CapturingRenderer {
    events: Mutex<Vec<RenderEvent>>,
}

impl CapturingRenderer {
    pub fn events(&self) -> Vec<RenderEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl OutputRendererPlugin for CapturingRenderer {
    fn name(&self) -> &str {
        "capture"
    }

    fn format(&self) -> &str {
        "test"
    }

    fn render(&self, event: &RenderEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub fn plan(specs: Vec<UnitSpec>) -> (Graph, LevelPlan) {
    let graph = Graph::build(specs).expect("graph should build");
    let plan = validate_and_layer(&graph).expect("graph should be acyclic");
    (graph, plan)
}

pub fn config(max_attempts: u32, fail_fast: bool) -> ExecutionConfig {
    ExecutionConfig {
        max_attempts,
        fail_fast,
        ..ExecutionConfig::default()
    }
}

pub fn ids(levels: &LevelPlan) -> Vec<Vec<&str>> {
    levels
        .levels
        .iter()
        .map(|l| l.unit_ids.iter().map(String::as_str).collect())
        .collect()
}
