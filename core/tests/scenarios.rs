mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{config, ids, plan, Behavior, ScriptedExecutor, StaticCheck};
use gantry_core::api::{
    CheckSpec, CheckpointSpec, ExecutionConfig, ExecutionEngine, Graph, GraphError, UnitSpec,
    UnitState, validate_and_layer,
};
use pretty_assertions::assert_eq;
use tokio::sync::Barrier;

#[tokio::test]
async fn fan_out_runs_dependents_concurrently() {
    let (graph, plan) = plan(vec![
        UnitSpec::new("A"),
        UnitSpec::new("B").depends_on(["A"]),
        UnitSpec::new("C").depends_on(["A"]),
    ]);
    assert_eq!(ids(&plan), vec![vec!["A"], vec!["B", "C"]]);

    // B and C can only get past the barrier if they run at the same time.
    let barrier = Arc::new(Barrier::new(2));
    let executor = Arc::new(
        ScriptedExecutor::new()
            .with("B", Behavior::Rendezvous(barrier.clone()))
            .with("C", Behavior::Rendezvous(barrier)),
    );

    let engine = ExecutionEngine::new(ExecutionConfig::default());
    let report = tokio::time::timeout(
        Duration::from_secs(10),
        engine.run(&graph, &plan, executor.clone()),
    )
    .await
    .expect("B and C should rendezvous")
    .unwrap();

    assert!(report.all_succeeded());
    assert_eq!(report.levels_completed(), 2);
    assert!(!report.aborted());
    assert_eq!(executor.calls_for("B")[0].dependencies, vec!["A".to_string()]);
}

#[test]
fn three_unit_cycle_is_reported_with_full_path() {
    let graph = Graph::build(vec![
        UnitSpec::new("A").depends_on(["B"]),
        UnitSpec::new("B").depends_on(["C"]),
        UnitSpec::new("C").depends_on(["A"]),
    ])
    .unwrap();

    let err = validate_and_layer(&graph).unwrap_err();
    assert_eq!(
        err,
        GraphError::CyclicDependency {
            path: vec!["A".into(), "B".into(), "C".into(), "A".into()],
        }
    );
}

#[tokio::test]
async fn always_failing_unit_blocks_after_budget() {
    let (graph, plan) = plan(vec![UnitSpec::new("X").with_checkpoint(
        CheckpointSpec::new("coverage-gate").with_check(CheckSpec::Named {
            name: "coverage".into(),
        }),
    )]);
    let executor = Arc::new(ScriptedExecutor::new());

    let engine = ExecutionEngine::builder(config(2, true))
        .check(StaticCheck::failing("coverage", "coverage<95%"))
        .build();
    let report = engine.run(&graph, &plan, executor.clone()).await.unwrap();

    let x = report.unit("X").unwrap();
    assert_eq!(x.state, UnitState::Blocked);
    assert_eq!(x.attempt_count, 2);
    assert_eq!(x.failure_reasons, vec!["coverage<95%", "coverage<95%"]);
    assert_eq!(executor.calls_for("X").len(), 2);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn overlapping_scopes_warn_and_second_acquirer_conflicts() {
    let (graph, plan) = plan(vec![
        UnitSpec::new("A").with_scope(["src/a/*"]),
        UnitSpec::new("B").with_scope(["src/a/utils.py"]),
    ]);

    assert_eq!(plan.warnings.len(), 1);
    assert_eq!(plan.warnings[0].first, "A");
    assert_eq!(plan.warnings[0].second, "B");

    let executor = Arc::new(
        ScriptedExecutor::new().with("A", Behavior::Sleep(Duration::from_millis(20))),
    );
    let engine = ExecutionEngine::new(ExecutionConfig::default());
    let report = engine.run(&graph, &plan, executor.clone()).await.unwrap();

    assert_eq!(report.state_of("A"), Some(UnitState::Succeeded));
    let b = report.unit("B").unwrap();
    assert_eq!(b.state, UnitState::Blocked);
    assert_eq!(b.attempt_count, 0);
    assert!(b.failure_reasons[0].starts_with("ScopeConflictError"));
    assert!(!executor.was_called("B"));
    assert_eq!(report.warnings().len(), 1);
    assert!(engine.allocator().is_idle());
}
