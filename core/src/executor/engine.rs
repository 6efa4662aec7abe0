use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{EngineError, ExecutionError};
use crate::util::generate_run_id;

use super::allocator::{WorkspaceAllocator, WorkspaceGuard};
use super::checkpoint::CheckpointValidator;
use super::checks::CheckRegistry;
use super::graph::{Graph, LevelPlan};
use super::output::EventEmitter;
use super::progress::ProgressMonitor;
use super::recovery::{Attempt, RecoveryController};
use super::report::{RunRecorder, RunReport, UnitReport};
use super::scheduler::execute_level_parallel;
use super::traits::{
    ExecutionContext, OutputRendererPlugin, RetryStrategyPlugin, UnitCheck, UnitExecutor,
};
use super::types::{ExecutionConfig, ExecutionOutput, FailedCheck, Unit, UnitState};

/// Execution engine for unit dependency graphs
pub struct ExecutionEngine {
    config: ExecutionConfig,
    checks: CheckRegistry,
    renderer: Option<Arc<dyn OutputRendererPlugin>>,
    retry_strategy: Option<Arc<dyn RetryStrategyPlugin>>,
    allocator: WorkspaceAllocator,
    run_id: Option<String>,
}

pub struct ExecutionEngineBuilder {
    config: ExecutionConfig,
    checks: CheckRegistry,
    renderer: Option<Arc<dyn OutputRendererPlugin>>,
    retry_strategy: Option<Arc<dyn RetryStrategyPlugin>>,
    allocator: Option<WorkspaceAllocator>,
    run_id: Option<String>,
}

/// What a unit task hands back to the control task.
struct UnitTaskResult {
    unit: Unit,
    report: UnitReport,
    output: Option<ExecutionOutput>,
}

/// Everything a spawned unit task owns.
struct UnitTask {
    unit: Unit,
    level: usize,
    attempt: Attempt,
    controller: RecoveryController,
    retry_strategy: Option<Arc<dyn RetryStrategyPlugin>>,
    emitter: EventEmitter,
    progress: Arc<Mutex<ProgressMonitor>>,
    guard: WorkspaceGuard,
}

impl ExecutionEngine {
    pub fn new(config: ExecutionConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: ExecutionConfig) -> ExecutionEngineBuilder {
        ExecutionEngineBuilder::new(config)
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn allocator(&self) -> &WorkspaceAllocator {
        &self.allocator
    }

    /// Run every level of `plan` against `graph`.
    ///
    /// Levels run strictly in order; units of one level run concurrently.
    /// Returns an error only for problems found before the first unit is
    /// dispatched; everything after that ends up in the report.
    #[tracing::instrument(
        name = "run",
        skip_all,
        fields(units = graph.len(), levels = plan.levels.len(), run_id = tracing::field::Empty)
    )]
    pub async fn run(
        &self,
        graph: &Graph,
        plan: &LevelPlan,
        executor: Arc<dyn UnitExecutor>,
    ) -> Result<RunReport, EngineError> {
        check_plan(graph, plan)?;
        let validator = Arc::new(CheckpointValidator::compile(graph, &self.checks)?);

        let run_id = self.run_id.clone().unwrap_or_else(generate_run_id);
        tracing::Span::current().record("run_id", run_id.as_str());

        let emitter = EventEmitter::new(run_id.clone(), self.renderer.clone());
        let mut recorder = RunRecorder::new(run_id.clone(), graph, plan);
        let progress = Arc::new(Mutex::new(ProgressMonitor::new(
            graph.len(),
            self.config.output.progress_bar,
        )));

        let mut units: HashMap<String, Unit> = graph
            .units()
            .iter()
            .map(|u| (u.id.clone(), u.clone()))
            .collect();
        let mut outputs: HashMap<String, ExecutionOutput> = HashMap::new();
        let mut aborted = false;

        emitter.run_start(graph.len(), plan.levels.len());
        emitter.plan(&plan.as_id_lists(), &plan.warnings);

        for level in &plan.levels {
            emitter.level_start(level.index, &level.unit_ids);
            if let Ok(monitor) = progress.lock() {
                monitor.update_level(level.index, plan.levels.len());
            }

            let mut newly_blocked: Vec<String> = Vec::new();
            let mut tasks = Vec::new();

            // Reserve workspaces in declaration order before anything runs.
            for unit_id in &level.unit_ids {
                let Some(unit) = units.get_mut(unit_id) else {
                    continue;
                };
                if unit.state != UnitState::Pending {
                    // Already blocked by an upstream failure.
                    continue;
                }
                unit.set_state(UnitState::Ready);

                match self.allocator.acquire_scoped(unit) {
                    Ok(guard) => {
                        let context = ExecutionContext {
                            run_id: run_id.clone(),
                            level: level.index,
                            attempt: 0,
                            prior_failures: None,
                            dependency_outputs: dependency_outputs(unit, &outputs),
                            workspace: guard.lock().clone(),
                        };
                        let task = UnitTask {
                            unit: unit.clone(),
                            level: level.index,
                            attempt: Attempt::new(
                                executor.clone(),
                                validator.clone(),
                                context,
                                unit.timeout.or_else(|| self.config.unit_timeout()),
                            ),
                            controller: RecoveryController::new(
                                unit.max_attempts.unwrap_or(self.config.max_attempts),
                            ),
                            retry_strategy: self.retry_strategy.clone(),
                            emitter: emitter.clone(),
                            progress: progress.clone(),
                            guard,
                        };
                        if let Ok(mut monitor) = progress.lock() {
                            monitor.add_unit(unit_id);
                        }
                        tasks.push((unit_id.clone(), task.run()));
                    }
                    Err(conflict) => {
                        tracing::warn!(unit_id = %unit_id, error = %conflict, "workspace unavailable");
                        unit.set_state(UnitState::Blocked);
                        let report =
                            UnitReport::blocked(unit.attempt_count, FailedCheck::from_scope_conflict(&conflict));
                        self.finish_unit(&emitter, &progress, unit_id, &report);
                        recorder.record(unit_id, report);
                        newly_blocked.push(unit_id.clone());
                    }
                }
            }

            let mut results = execute_level_parallel(tasks, self.config.max_parallel).await;

            for unit_id in &level.unit_ids {
                let Some(joined) = results.remove(unit_id) else {
                    continue;
                };
                match joined {
                    Ok(done) => {
                        if done.unit.state == UnitState::Blocked {
                            newly_blocked.push(unit_id.clone());
                        }
                        if let Some(output) = done.output {
                            outputs.insert(unit_id.clone(), output);
                        }
                        recorder.record(unit_id, done.report);
                        units.insert(unit_id.clone(), done.unit);
                    }
                    Err(join_err) => {
                        // Only reachable if a task dies outside its own guards.
                        let err = ExecutionError::Panicked(join_err.to_string());
                        tracing::error!(unit_id = %unit_id, error = %err, "unit task aborted");
                        let attempts = units.get(unit_id).map(|u| u.attempt_count).unwrap_or(0);
                        if let Some(unit) = units.get_mut(unit_id) {
                            unit.set_state(UnitState::Blocked);
                        }
                        let report = UnitReport::blocked(attempts, FailedCheck::from_execution_error(&err));
                        self.finish_unit(&emitter, &progress, unit_id, &report);
                        recorder.record(unit_id, report);
                        newly_blocked.push(unit_id.clone());
                    }
                }
            }

            for cause in &newly_blocked {
                self.propagate_block(graph, cause, &mut units, &mut recorder, &emitter, &progress);
            }

            recorder.complete_level();
            emitter.level_end(level.index);

            if !newly_blocked.is_empty() && self.config.fail_fast {
                tracing::warn!(
                    level = level.index,
                    blocked = %newly_blocked.join(", "),
                    "aborting run after blocked level"
                );
                aborted = true;
                break;
            }
        }

        let report = recorder.finalize(aborted);
        if let Ok(monitor) = progress.lock() {
            monitor.finish(report.all_succeeded());
        }
        emitter.run_end(&report);

        Ok(report)
    }

    /// Mark every transitive dependent of `cause` blocked. Dependents are
    /// never dispatched afterwards.
    fn propagate_block(
        &self,
        graph: &Graph,
        cause: &str,
        units: &mut HashMap<String, Unit>,
        recorder: &mut RunRecorder,
        emitter: &EventEmitter,
        progress: &Arc<Mutex<ProgressMonitor>>,
    ) {
        for dependent in graph.transitive_dependents(cause) {
            let Some(unit) = units.get_mut(dependent) else {
                continue;
            };
            if unit.state != UnitState::Pending {
                continue;
            }
            unit.set_state(UnitState::Blocked);
            tracing::info!(unit_id = %dependent, blocked_by = %cause, "unit blocked by dependency");

            recorder.record_propagated_block(dependent, cause);
            if let Some(report) = recorder.unit(dependent) {
                self.finish_unit(emitter, progress, dependent, report);
            }
        }
    }

    fn finish_unit(
        &self,
        emitter: &EventEmitter,
        progress: &Arc<Mutex<ProgressMonitor>>,
        unit_id: &str,
        report: &UnitReport,
    ) {
        emitter.unit_complete(unit_id, report);
        if let Ok(mut monitor) = progress.lock() {
            monitor.complete_unit(unit_id, report.state, report.duration_ms);
        }
    }
}

impl UnitTask {
    /// Execute, evaluate, recover until terminal. The workspace guard is
    /// dropped with `self` on every exit path.
    async fn run(self) -> UnitTaskResult {
        let UnitTask {
            mut unit,
            level,
            attempt,
            controller,
            retry_strategy,
            emitter,
            progress,
            guard,
        } = self;

        unit.set_state(UnitState::Running);
        unit.attempt_count = 1;
        emitter.unit_start(&unit.id, level, unit.attempt_count);

        let mut outcome = attempt.run(&unit, None).await;
        let mut history = vec![outcome.record(unit.attempt_count)];
        controller.settle(&mut unit, &outcome.result);

        while unit.state == UnitState::Failed {
            let next = unit.attempt_count + 1;
            let delay = retry_strategy
                .as_ref()
                .map(|s| s.next_delay(unit.attempt_count))
                .unwrap_or(Duration::ZERO);
            let reasons: Vec<String> = outcome.result.reasons().map(str::to_string).collect();

            emitter.unit_retry(&unit.id, next, delay.as_millis() as u64, &reasons);
            if let Ok(monitor) = progress.lock() {
                monitor.retry_unit(&unit.id, next);
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let previous = outcome.result.clone();
            outcome = controller
                .attempt_recovery(&mut unit, &previous, &attempt)
                .await;
            history.push(outcome.record(unit.attempt_count));
        }

        let report = UnitReport::from_attempts(unit.state, unit.attempt_count, history);
        emitter.unit_complete(&unit.id, &report);
        if let Ok(mut monitor) = progress.lock() {
            monitor.complete_unit(&unit.id, report.state, report.duration_ms);
        }
        drop(guard);

        let output = if unit.state == UnitState::Succeeded {
            outcome.output
        } else {
            None
        };

        UnitTaskResult {
            unit,
            report,
            output,
        }
    }
}

/// Outputs of `unit`'s direct dependencies that finished successfully.
fn dependency_outputs(
    unit: &Unit,
    outputs: &HashMap<String, ExecutionOutput>,
) -> HashMap<String, ExecutionOutput> {
    unit.dependencies
        .iter()
        .filter_map(|dep| outputs.get(dep).map(|o| (dep.clone(), o.clone())))
        .collect()
}

/// The plan must cover every graph unit exactly once, after its dependencies.
fn check_plan(graph: &Graph, plan: &LevelPlan) -> Result<(), EngineError> {
    let mut placed: HashSet<&str> = HashSet::with_capacity(graph.len());

    for level in &plan.levels {
        for unit_id in &level.unit_ids {
            let Some(unit) = graph.unit(unit_id) else {
                return Err(EngineError::PlanMismatch(format!(
                    "unknown unit '{unit_id}' in level {}",
                    level.index
                )));
            };
            if let Some(dep) = unit.dependencies.iter().find(|d| !placed.contains(d.as_str())) {
                return Err(EngineError::PlanMismatch(format!(
                    "unit '{unit_id}' in level {} runs before its dependency '{dep}'",
                    level.index
                )));
            }
        }
        for unit_id in &level.unit_ids {
            if !placed.insert(unit_id.as_str()) {
                return Err(EngineError::PlanMismatch(format!(
                    "unit '{unit_id}' is planned more than once"
                )));
            }
        }
    }

    if placed.len() != graph.len() {
        return Err(EngineError::PlanMismatch(format!(
            "plan covers {} of {} units",
            placed.len(),
            graph.len()
        )));
    }

    Ok(())
}

impl ExecutionEngineBuilder {
    pub fn new(config: ExecutionConfig) -> Self {
        Self {
            config,
            checks: CheckRegistry::new(),
            renderer: None,
            retry_strategy: None,
            allocator: None,
            run_id: None,
        }
    }

    pub fn renderer(mut self, renderer: Arc<dyn OutputRendererPlugin>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn retry_strategy(mut self, strategy: Arc<dyn RetryStrategyPlugin>) -> Self {
        self.retry_strategy = Some(strategy);
        self
    }

    /// Register a check for `named` checkpoint entries.
    pub fn check(mut self, check: Arc<dyn UnitCheck>) -> Self {
        self.checks.register(check);
        self
    }

    pub fn checks(mut self, registry: CheckRegistry) -> Self {
        self.checks = registry;
        self
    }

    /// Share a lock table with other engines.
    pub fn allocator(mut self, allocator: WorkspaceAllocator) -> Self {
        self.allocator = Some(allocator);
        self
    }

    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn build(self) -> ExecutionEngine {
        ExecutionEngine {
            config: self.config,
            checks: self.checks,
            renderer: self.renderer,
            retry_strategy: self.retry_strategy,
            allocator: self.allocator.unwrap_or_default(),
            run_id: self.run_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::graph::{validate_and_layer, ExecutionLevel};
    use crate::executor::types::UnitSpec;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl UnitExecutor for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn execute(
            &self,
            unit: &Unit,
            ctx: &ExecutionContext,
        ) -> Result<ExecutionOutput, ExecutionError> {
            let mut deps: Vec<&String> = ctx.dependency_outputs.keys().collect();
            deps.sort();
            Ok(ExecutionOutput::success(format!("{}<-{:?}", unit.id, deps)))
        }
    }

    fn graph() -> Graph {
        Graph::build(vec![
            UnitSpec::new("a"),
            UnitSpec::new("b").depends_on(["a"]),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn rejects_plan_that_skips_units() {
        let graph = graph();
        let plan = LevelPlan {
            levels: vec![ExecutionLevel {
                index: 0,
                unit_ids: vec!["a".into()],
            }],
            warnings: Vec::new(),
        };
        let err = ExecutionEngine::new(ExecutionConfig::default())
            .run(&graph, &plan, Arc::new(Echo))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PlanMismatch(_)));
    }

    #[tokio::test]
    async fn rejects_plan_out_of_dependency_order() {
        let graph = graph();
        let plan = LevelPlan {
            levels: vec![
                ExecutionLevel { index: 0, unit_ids: vec!["b".into()] },
                ExecutionLevel { index: 1, unit_ids: vec!["a".into()] },
            ],
            warnings: Vec::new(),
        };
        let err = ExecutionEngine::new(ExecutionConfig::default())
            .run(&graph, &plan, Arc::new(Echo))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("before its dependency 'a'"));
    }

    #[tokio::test]
    async fn runs_levels_and_releases_every_lock() {
        let graph = graph();
        let plan = validate_and_layer(&graph).unwrap();
        let engine = ExecutionEngine::builder(ExecutionConfig::default())
            .run_id("run-fixed")
            .build();

        let report = engine.run(&graph, &plan, Arc::new(Echo)).await.unwrap();

        assert_eq!(report.run_id(), "run-fixed");
        assert_eq!(report.levels_completed(), 2);
        assert!(report.all_succeeded());
        assert!(engine.allocator().is_idle());
    }
}
