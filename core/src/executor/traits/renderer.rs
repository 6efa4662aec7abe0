use crate::executor::graph::ScopeOverlapWarning;
use crate::executor::report::{RunReport, UnitReport};

/// Output renderer plugin (controls how run events are shown)
pub trait OutputRendererPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn format(&self) -> &str;
    fn supports_streaming(&self) -> bool {
        false
    }
    fn render(&self, event: &RenderEvent);
}

/// Run event, shared by every renderer
#[derive(Debug, Clone)]
pub enum RenderEvent {
    RunStart {
        run_id: String,
        total_units: usize,
        total_levels: usize,
    },
    Plan {
        run_id: String,
        levels: Vec<Vec<String>>,
        warnings: Vec<ScopeOverlapWarning>,
    },
    LevelStart {
        run_id: String,
        level: usize,
        unit_ids: Vec<String>,
    },
    UnitStart {
        run_id: String,
        unit_id: String,
        level: usize,
        attempt: u32,
    },
    UnitRetry {
        run_id: String,
        unit_id: String,
        attempt: u32,
        delay_ms: u64,
        reasons: Vec<String>,
    },
    UnitComplete {
        run_id: String,
        unit_id: String,
        result: UnitReport,
    },
    LevelEnd {
        run_id: String,
        level: usize,
    },
    RunEnd {
        run_id: String,
        report: RunReport,
    },
}

impl RenderEvent {
    pub fn run_id(&self) -> &str {
        match self {
            RenderEvent::RunStart { run_id, .. }
            | RenderEvent::Plan { run_id, .. }
            | RenderEvent::LevelStart { run_id, .. }
            | RenderEvent::UnitStart { run_id, .. }
            | RenderEvent::UnitRetry { run_id, .. }
            | RenderEvent::UnitComplete { run_id, .. }
            | RenderEvent::LevelEnd { run_id, .. }
            | RenderEvent::RunEnd { run_id, .. } => run_id,
        }
    }
}
