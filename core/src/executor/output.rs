use std::sync::Arc;

use super::graph::ScopeOverlapWarning;
use super::report::{RunReport, UnitReport};
use super::traits::{OutputRendererPlugin, RenderEvent};

/// Routes run events to the configured renderer, falling back to
/// structured `tracing` events when none is set.
#[derive(Clone)]
pub struct EventEmitter {
    run_id: String,
    renderer: Option<Arc<dyn OutputRendererPlugin>>,
}

impl EventEmitter {
    pub fn new(run_id: impl Into<String>, renderer: Option<Arc<dyn OutputRendererPlugin>>) -> Self {
        Self {
            run_id: run_id.into(),
            renderer,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn render_or(&self, event: impl FnOnce(String) -> RenderEvent, fallback: impl FnOnce()) {
        match &self.renderer {
            Some(renderer) => renderer.render(&event(self.run_id.clone())),
            None => fallback(),
        }
    }

    pub fn run_start(&self, total_units: usize, total_levels: usize) {
        self.render_or(
            |run_id| RenderEvent::RunStart {
                run_id,
                total_units,
                total_levels,
            },
            || emit_run_start(&self.run_id, total_units, total_levels),
        );
    }

    pub fn plan(&self, levels: &[Vec<String>], warnings: &[ScopeOverlapWarning]) {
        self.render_or(
            |run_id| RenderEvent::Plan {
                run_id,
                levels: levels.to_vec(),
                warnings: warnings.to_vec(),
            },
            || emit_execution_plan(&self.run_id, levels),
        );
    }

    pub fn level_start(&self, level: usize, unit_ids: &[String]) {
        self.render_or(
            |run_id| RenderEvent::LevelStart {
                run_id,
                level,
                unit_ids: unit_ids.to_vec(),
            },
            || emit_level_start(&self.run_id, level, unit_ids),
        );
    }

    pub fn unit_start(&self, unit_id: &str, level: usize, attempt: u32) {
        self.render_or(
            |run_id| RenderEvent::UnitStart {
                run_id,
                unit_id: unit_id.to_string(),
                level,
                attempt,
            },
            || emit_unit_start(&self.run_id, unit_id, level, attempt),
        );
    }

    pub fn unit_retry(&self, unit_id: &str, attempt: u32, delay_ms: u64, reasons: &[String]) {
        self.render_or(
            |run_id| RenderEvent::UnitRetry {
                run_id,
                unit_id: unit_id.to_string(),
                attempt,
                delay_ms,
                reasons: reasons.to_vec(),
            },
            || emit_unit_retry(&self.run_id, unit_id, attempt, delay_ms, reasons),
        );
    }

    pub fn unit_complete(&self, unit_id: &str, result: &UnitReport) {
        self.render_or(
            |run_id| RenderEvent::UnitComplete {
                run_id,
                unit_id: unit_id.to_string(),
                result: result.clone(),
            },
            || emit_unit_complete(&self.run_id, unit_id, result),
        );
    }

    pub fn level_end(&self, level: usize) {
        self.render_or(
            |run_id| RenderEvent::LevelEnd { run_id, level },
            || emit_level_end(&self.run_id, level),
        );
    }

    pub fn run_end(&self, report: &RunReport) {
        self.render_or(
            |run_id| RenderEvent::RunEnd {
                run_id,
                report: report.clone(),
            },
            || emit_run_end(&self.run_id, report),
        );
    }
}

pub fn emit_execution_plan(run_id: &str, levels: &[Vec<String>]) {
    for (i, level) in levels.iter().enumerate() {
        tracing::debug!(run_id, level = i, units = %level.join(", "), "execution plan");
    }
}

pub fn emit_run_start(run_id: &str, total_units: usize, total_levels: usize) {
    tracing::info!(run_id, total_units, total_levels, "run started");
}

pub fn emit_level_start(run_id: &str, level: usize, unit_ids: &[String]) {
    tracing::info!(run_id, level, units = unit_ids.len(), "level started");
}

pub fn emit_unit_start(run_id: &str, unit_id: &str, level: usize, attempt: u32) {
    tracing::debug!(run_id, unit_id, level, attempt, "unit started");
}

pub fn emit_unit_retry(run_id: &str, unit_id: &str, attempt: u32, delay_ms: u64, reasons: &[String]) {
    tracing::info!(
        run_id,
        unit_id,
        attempt,
        delay_ms,
        reasons = %reasons.join("; "),
        "unit retry scheduled"
    );
}

pub fn emit_unit_complete(run_id: &str, unit_id: &str, result: &UnitReport) {
    if result.failure_reasons.is_empty() {
        tracing::info!(
            run_id,
            unit_id,
            state = %result.state,
            attempts = result.attempt_count,
            "unit finished"
        );
    } else {
        tracing::warn!(
            run_id,
            unit_id,
            state = %result.state,
            attempts = result.attempt_count,
            reasons = %result.failure_reasons.join("; "),
            "unit finished"
        );
    }
}

pub fn emit_level_end(run_id: &str, level: usize) {
    tracing::debug!(run_id, level, "level finished");
}

pub fn emit_run_end(run_id: &str, report: &RunReport) {
    tracing::info!(
        run_id,
        aborted = report.aborted(),
        levels_completed = report.levels_completed(),
        duration_ms = report.duration_ms(),
        "run finished: {}",
        report.summary()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture {
        events: Mutex<Vec<String>>,
    }

    impl OutputRendererPlugin for Capture {
        fn name(&self) -> &str {
            "capture"
        }

        fn format(&self) -> &str {
            "test"
        }

        fn render(&self, event: &RenderEvent) {
            let tag = match event {
                RenderEvent::LevelStart { level, .. } => format!("level:{level}"),
                RenderEvent::UnitRetry { unit_id, attempt, .. } => format!("retry:{unit_id}:{attempt}"),
                other => format!("{other:?}").split_whitespace().next().unwrap_or("").to_string(),
            };
            assert_eq!(event.run_id(), "run-7");
            self.events.lock().unwrap().push(tag);
        }
    }

    #[test]
    fn renderer_receives_events_with_run_id() {
        let capture = Arc::new(Capture::default());
        let emitter = EventEmitter::new("run-7", Some(capture.clone()));

        emitter.level_start(2, &["a".to_string()]);
        emitter.unit_retry("a", 2, 100, &["boom".to_string()]);

        assert_eq!(
            *capture.events.lock().unwrap(),
            vec!["level:2".to_string(), "retry:a:2".to_string()]
        );
    }

    #[test]
    fn fallback_does_not_panic_without_renderer() {
        let emitter = EventEmitter::new("run-7", None);
        emitter.run_start(3, 2);
        emitter.plan(&[vec!["a".into()], vec!["b".into(), "c".into()]], &[]);
        emitter.unit_start("a", 0, 1);
        emitter.level_end(0);
        assert_eq!(emitter.run_id(), "run-7");
    }
}
