use chrono::Local;
use gantry_core::api::{OutputRendererPlugin, RenderEvent};
use serde_json::{json, Value};

/// One JSON object per event on stderr: `{v, event_type, ts, run_id, unit_id?, metadata}`.
pub struct JsonlRendererPlugin {
    pretty_print: bool,
}

impl JsonlRendererPlugin {
    pub fn new(pretty_print: bool) -> Self {
        Self { pretty_print }
    }

    fn event_to_json(&self, event: &RenderEvent) -> Value {
        let ts = Local::now().to_rfc3339();
        match event {
            RenderEvent::RunStart {
                run_id,
                total_units,
                total_levels,
            } => json!({
                "v": 1,
                "event_type": "run.start",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "total_units": total_units,
                    "total_levels": total_levels,
                }
            }),
            RenderEvent::Plan {
                run_id,
                levels,
                warnings,
            } => json!({
                "v": 1,
                "event_type": "executor.plan",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "levels": levels,
                    "total_units": levels.iter().map(Vec::len).sum::<usize>(),
                    "warnings": warnings,
                }
            }),
            RenderEvent::LevelStart {
                run_id,
                level,
                unit_ids,
            } => json!({
                "v": 1,
                "event_type": "level.start",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "level": level,
                    "units": unit_ids,
                }
            }),
            RenderEvent::UnitStart {
                run_id,
                unit_id,
                level,
                attempt,
            } => json!({
                "v": 1,
                "event_type": "unit.start",
                "ts": ts,
                "run_id": run_id,
                "unit_id": unit_id,
                "metadata": {
                    "level": level,
                    "attempt": attempt,
                }
            }),
            RenderEvent::UnitRetry {
                run_id,
                unit_id,
                attempt,
                delay_ms,
                reasons,
            } => json!({
                "v": 1,
                "event_type": "unit.retry",
                "ts": ts,
                "run_id": run_id,
                "unit_id": unit_id,
                "metadata": {
                    "attempt": attempt,
                    "delay_ms": delay_ms,
                    "reasons": reasons,
                }
            }),
            RenderEvent::UnitComplete {
                run_id,
                unit_id,
                result,
            } => json!({
                "v": 1,
                "event_type": "unit.end",
                "ts": ts,
                "run_id": run_id,
                "unit_id": unit_id,
                "metadata": {
                    "state": result.state,
                    "attempt_count": result.attempt_count,
                    "duration_ms": result.duration_ms,
                    "failure_reasons": result.failure_reasons,
                    "blocked_by": result.blocked_by,
                }
            }),
            RenderEvent::LevelEnd { run_id, level } => json!({
                "v": 1,
                "event_type": "level.end",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "level": level,
                }
            }),
            RenderEvent::RunEnd { run_id, report } => {
                let summary = report.summary();
                json!({
                    "v": 1,
                    "event_type": "run.end",
                    "ts": ts,
                    "run_id": run_id,
                    "code": report.exit_code(),
                    "metadata": {
                        "total_units": summary.total,
                        "succeeded": summary.succeeded,
                        "blocked": summary.blocked,
                        "levels_completed": report.levels_completed(),
                        "aborted": report.aborted(),
                        "duration_ms": report.duration_ms(),
                    }
                })
            }
        }
    }
}

impl OutputRendererPlugin for JsonlRendererPlugin {
    fn name(&self) -> &str {
        "jsonl-renderer"
    }

    fn format(&self) -> &str {
        "jsonl"
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn render(&self, event: &RenderEvent) {
        let value = self.event_to_json(event);
        let line = if self.pretty_print {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        };
        eprintln!("{}", line.unwrap_or_else(|_| "{}".into()));
    }
}
