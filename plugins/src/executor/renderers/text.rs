use gantry_core::api::{OutputRendererPlugin, RenderEvent, UnitState};

pub struct TextRendererPlugin {
    ascii_only: bool,
}

impl TextRendererPlugin {
    pub fn new(ascii_only: bool) -> Self {
        Self { ascii_only }
    }

    fn status_label(&self, state: UnitState) -> &'static str {
        match (state, self.ascii_only) {
            (UnitState::Succeeded, true) => "OK",
            (UnitState::Succeeded, false) => "✓ SUCCEEDED",
            (UnitState::Blocked, true) => "BLOCKED",
            (UnitState::Blocked, false) => "✗ BLOCKED",
            (other, _) => other.as_str(),
        }
    }

    fn format_event(&self, event: &RenderEvent) -> String {
        match event {
            RenderEvent::RunStart {
                run_id,
                total_units,
                total_levels,
            } => format!(
                "RUN START {} (units: {}, levels: {})",
                run_id, total_units, total_levels
            ),
            RenderEvent::Plan {
                run_id,
                levels,
                warnings,
            } => {
                let mut out = format!("PLAN {}:", run_id);
                for (idx, level) in levels.iter().enumerate() {
                    out.push_str(&format!("\n  level {}: {}", idx, level.join(", ")));
                }
                for warning in warnings {
                    out.push_str(&format!("\n  warning: {}", warning));
                }
                out
            }
            RenderEvent::LevelStart {
                run_id,
                level,
                unit_ids,
            } => format!(
                "LEVEL START {} (level {}, units: {})",
                run_id,
                level,
                unit_ids.len()
            ),
            RenderEvent::UnitStart {
                run_id,
                unit_id,
                level,
                attempt,
            } => format!(
                "UNIT START {} (level {}, unit {}, attempt {})",
                run_id, level, unit_id, attempt
            ),
            RenderEvent::UnitRetry {
                run_id,
                unit_id,
                attempt,
                delay_ms,
                reasons,
            } => {
                let mut line = format!(
                    "UNIT RETRY {} (unit {}, attempt {}, in {}ms)",
                    run_id, unit_id, attempt, delay_ms
                );
                if !reasons.is_empty() {
                    line.push_str(&format!(": {}", reasons.join("; ")));
                }
                line
            }
            RenderEvent::UnitComplete {
                run_id,
                unit_id,
                result,
            } => {
                let mut line = format!(
                    "UNIT END {} (unit {}, status {}, attempts {}, duration {}ms)",
                    run_id,
                    unit_id,
                    self.status_label(result.state),
                    result.attempt_count,
                    result.duration_ms
                );
                if let Some(last) = result.failure_reasons.last() {
                    if result.state == UnitState::Blocked {
                        line.push_str(&format!(": {}", last));
                    }
                }
                line
            }
            RenderEvent::LevelEnd { run_id, level } => {
                format!("LEVEL END {} (level {})", run_id, level)
            }
            RenderEvent::RunEnd { run_id, report } => format!(
                "RUN END {} ({}, levels {}, {}duration {}ms)",
                run_id,
                report.summary(),
                report.levels_completed(),
                if report.aborted() { "aborted, " } else { "" },
                report.duration_ms()
            ),
        }
    }
}

impl OutputRendererPlugin for TextRendererPlugin {
    fn name(&self) -> &str {
        "text-renderer"
    }

    fn format(&self) -> &str {
        "text"
    }

    fn render(&self, event: &RenderEvent) {
        eprintln!("{}", self.format_event(event));
    }
}
