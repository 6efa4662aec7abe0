use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::executor::graph::{Graph, LevelPlan, ScopeOverlapWarning};
use crate::executor::types::{AttemptRecord, FailedCheck, UnitState};

/// Final record for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReport {
    pub state: UnitState,
    pub attempt_count: u32,
    /// Every failure reason from every attempt, oldest first
    pub failure_reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AttemptRecord>,
    /// Dependency whose block propagated to this unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl UnitReport {
    pub fn pending() -> Self {
        Self {
            state: UnitState::Pending,
            attempt_count: 0,
            failure_reasons: Vec::new(),
            attempts: Vec::new(),
            blocked_by: None,
            duration_ms: 0,
        }
    }

    /// Build a report from the attempt history, flattening every reason.
    pub fn from_attempts(state: UnitState, attempt_count: u32, attempts: Vec<AttemptRecord>) -> Self {
        let failure_reasons = attempts
            .iter()
            .flat_map(|a| a.failed_checks.iter().map(|f| f.reason.clone()))
            .collect();
        let duration_ms = attempts.iter().map(|a| a.duration_ms).sum();
        Self {
            state,
            attempt_count,
            failure_reasons,
            attempts,
            blocked_by: None,
            duration_ms,
        }
    }

    /// A unit blocked without running at all.
    pub fn blocked(attempt_count: u32, failure: FailedCheck) -> Self {
        Self {
            state: UnitState::Blocked,
            attempt_count,
            failure_reasons: vec![failure.reason],
            attempts: Vec::new(),
            blocked_by: None,
            duration_ms: 0,
        }
    }
}

/// Counts per final state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub blocked: usize,
    pub failed: usize,
    pub pending: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} units succeeded, {} blocked",
            self.succeeded, self.total, self.blocked
        )?;
        if self.pending > 0 {
            write!(f, ", {} not run", self.pending)?;
        }
        Ok(())
    }
}

/// Run-level report. Produced once by [`RunRecorder::finalize`] and never
/// changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    run_id: String,
    units: BTreeMap<String, UnitReport>,
    levels_completed: usize,
    aborted: bool,
    started_at: String,
    finished_at: String,
    duration_ms: u64,
    levels: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<ScopeOverlapWarning>,
}

impl RunReport {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn units(&self) -> &BTreeMap<String, UnitReport> {
        &self.units
    }

    pub fn unit(&self, id: &str) -> Option<&UnitReport> {
        self.units.get(id)
    }

    pub fn state_of(&self, id: &str) -> Option<UnitState> {
        self.units.get(id).map(|u| u.state)
    }

    pub fn levels_completed(&self) -> usize {
        self.levels_completed
    }

    pub fn aborted(&self) -> bool {
        self.aborted
    }

    pub fn started_at(&self) -> &str {
        &self.started_at
    }

    pub fn finished_at(&self) -> &str {
        &self.finished_at
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    pub fn warnings(&self) -> &[ScopeOverlapWarning] {
        &self.warnings
    }

    pub fn all_succeeded(&self) -> bool {
        self.units.values().all(|u| u.state == UnitState::Succeeded)
    }

    /// 0 when every unit succeeded, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.all_succeeded() {
            0
        } else {
            1
        }
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.units.len(),
            ..RunSummary::default()
        };
        for unit in self.units.values() {
            match unit.state {
                UnitState::Succeeded => summary.succeeded += 1,
                UnitState::Blocked => summary.blocked += 1,
                UnitState::Failed => summary.failed += 1,
                UnitState::Pending | UnitState::Ready | UnitState::Running => summary.pending += 1,
            }
        }
        summary
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Mutable side of the report, owned by the engine's control task.
#[derive(Debug)]
pub struct RunRecorder {
    run_id: String,
    units: BTreeMap<String, UnitReport>,
    levels_completed: usize,
    levels: Vec<Vec<String>>,
    warnings: Vec<ScopeOverlapWarning>,
    started_at: String,
    clock: Instant,
}

impl RunRecorder {
    /// Every graph unit starts as `pending` with zero attempts.
    pub fn new(run_id: impl Into<String>, graph: &Graph, plan: &LevelPlan) -> Self {
        Self {
            run_id: run_id.into(),
            units: graph
                .units()
                .iter()
                .map(|u| (u.id.clone(), UnitReport::pending()))
                .collect(),
            levels_completed: 0,
            levels: plan.as_id_lists(),
            warnings: plan.warnings.clone(),
            started_at: Local::now().to_rfc3339(),
            clock: Instant::now(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn record(&mut self, unit_id: &str, report: UnitReport) {
        self.units.insert(unit_id.to_string(), report);
    }

    /// Mark `unit_id` blocked because `cause` ended blocked.
    pub fn record_propagated_block(&mut self, unit_id: &str, cause: &str) {
        let mut report = UnitReport::blocked(0, FailedCheck::blocked_by(cause));
        report.blocked_by = Some(cause.to_string());
        self.record(unit_id, report);
    }

    pub fn unit(&self, unit_id: &str) -> Option<&UnitReport> {
        self.units.get(unit_id)
    }

    pub fn complete_level(&mut self) {
        self.levels_completed += 1;
    }

    pub fn finalize(self, aborted: bool) -> RunReport {
        RunReport {
            run_id: self.run_id,
            units: self.units,
            levels_completed: self.levels_completed,
            aborted,
            started_at: self.started_at,
            finished_at: Local::now().to_rfc3339(),
            duration_ms: self.clock.elapsed().as_millis() as u64,
            levels: self.levels,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::graph::validate_and_layer;
    use crate::executor::types::UnitSpec;
    use pretty_assertions::assert_eq;

    fn recorder() -> RunRecorder {
        let graph = Graph::build(vec![
            UnitSpec::new("a"),
            UnitSpec::new("b").depends_on(["a"]),
            UnitSpec::new("c").depends_on(["b"]),
        ])
        .unwrap();
        let plan = validate_and_layer(&graph).unwrap();
        RunRecorder::new("run-1", &graph, &plan)
    }

    fn failing(attempt: u32, reason: &str) -> AttemptRecord {
        AttemptRecord {
            attempt,
            duration_ms: 5,
            passed: false,
            failed_checks: vec![FailedCheck::new("coverage", reason)],
        }
    }

    #[test]
    fn unit_report_keeps_every_attempt_reason() {
        let report = UnitReport::from_attempts(
            UnitState::Blocked,
            2,
            vec![failing(1, "coverage<95%"), failing(2, "coverage<95%")],
        );
        assert_eq!(report.failure_reasons, vec!["coverage<95%", "coverage<95%"]);
        assert_eq!(report.duration_ms, 10);
    }

    #[test]
    fn finalized_report_serializes_required_keys() {
        let mut rec = recorder();
        rec.record("a", UnitReport::from_attempts(UnitState::Blocked, 1, vec![failing(1, "boom")]));
        rec.record_propagated_block("b", "a");
        rec.record_propagated_block("c", "a");
        rec.complete_level();
        let report = rec.finalize(true);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["run_id"], "run-1");
        assert_eq!(json["levels_completed"], 1);
        assert_eq!(json["aborted"], true);
        assert_eq!(json["units"]["a"]["state"], "blocked");
        assert_eq!(json["units"]["a"]["failure_reasons"], serde_json::json!(["boom"]));
        assert_eq!(json["units"]["c"]["blocked_by"], "a");
        assert_eq!(json["units"]["c"]["attempt_count"], 0);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn summary_counts_each_state() {
        let mut rec = recorder();
        rec.record("a", UnitReport::from_attempts(UnitState::Succeeded, 1, Vec::new()));
        rec.record("b", UnitReport::blocked(0, FailedCheck::new("workspace", "conflict")));
        let report = rec.finalize(true);

        let summary = report.summary();
        assert_eq!(
            summary,
            RunSummary {
                total: 3,
                succeeded: 1,
                blocked: 1,
                failed: 0,
                pending: 1,
            }
        );
        assert_eq!(summary.to_string(), "1/3 units succeeded, 1 blocked, 1 not run");
    }

    #[test]
    fn all_succeeded_exits_zero() {
        let mut rec = recorder();
        for id in ["a", "b", "c"] {
            rec.record(id, UnitReport::from_attempts(UnitState::Succeeded, 1, Vec::new()));
        }
        let report = rec.finalize(false);
        assert_eq!(report.exit_code(), 0);
        assert!(!report.aborted());

        let parsed: RunReport = serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
        assert_eq!(parsed, report);
    }
}
