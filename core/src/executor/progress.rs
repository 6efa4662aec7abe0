use std::collections::HashMap;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::types::UnitState;

/// Visual progress monitor for a run
///
/// One overall bar over units plus a spinner per running unit. Draws to
/// stderr so stdout stays reserved for the report.
pub struct ProgressMonitor {
    /// Multi-progress container
    multi: MultiProgress,
    /// Overall progress bar
    overall: ProgressBar,
    /// Per-unit spinners
    unit_bars: HashMap<String, ProgressBar>,
    /// Whether monitoring is enabled
    enabled: bool,
}

impl ProgressMonitor {
    /// Create a new progress monitor
    ///
    /// # Arguments
    ///
    /// * `total_units` - Total number of units in the graph
    /// * `enabled` - Whether to draw anything (disabled for jsonl output)
    pub fn new(total_units: usize, enabled: bool) -> Self {
        if !enabled {
            return Self::hidden();
        }

        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
        let overall = multi.add(ProgressBar::new(total_units as u64));

        let style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} units ({percent}%) {msg}");
        match style {
            Ok(style) => overall.set_style(style.progress_chars("█▓▒░  ")),
            Err(err) => tracing::debug!(error = %err, "progress template rejected"),
        }
        overall.set_message("Starting...");

        Self {
            multi,
            overall,
            unit_bars: HashMap::new(),
            enabled: true,
        }
    }

    fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            overall: ProgressBar::hidden(),
            unit_bars: HashMap::new(),
            enabled: false,
        }
    }

    /// Add a unit and create its spinner
    pub fn add_unit(&mut self, unit_id: &str) {
        if !self.enabled {
            return;
        }

        let bar = self.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.green} {msg}") {
            bar.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        bar.set_message(format!("⏳ {unit_id}"));
        bar.enable_steady_tick(Duration::from_millis(100));

        self.unit_bars.insert(unit_id.to_string(), bar);
    }

    /// Show a retry on the unit's spinner
    pub fn retry_unit(&self, unit_id: &str, attempt: u32) {
        if let Some(bar) = self.unit_bars.get(unit_id) {
            bar.set_message(format!("🔁 {unit_id} (attempt {attempt})"));
        }
    }

    /// Mark a unit as terminal
    pub fn complete_unit(&mut self, unit_id: &str, state: UnitState, duration_ms: u64) {
        if !self.enabled {
            return;
        }

        let icon = if state == UnitState::Succeeded { "✅" } else { "❌" };
        match self.unit_bars.remove(unit_id) {
            Some(bar) => bar.finish_with_message(format!("{icon} {unit_id} ({duration_ms}ms)")),
            None => {
                // Blocked before dispatch; no spinner was ever created.
                self.overall.println(format!("  {icon} {unit_id} ({state})"));
            }
        }

        self.overall.inc(1);
    }

    /// Update overall progress message
    pub fn set_message(&self, msg: &str) {
        if self.enabled {
            self.overall.set_message(msg.to_string());
        }
    }

    /// Mark level progress
    pub fn update_level(&self, level: usize, total_levels: usize) {
        if self.enabled {
            self.overall
                .set_message(format!("Level {}/{}", level + 1, total_levels));
        }
    }

    /// Finish overall progress
    pub fn finish(&self, success: bool) {
        if !self.enabled {
            return;
        }

        let msg = if success {
            "✅ All units succeeded"
        } else {
            "❌ Run blocked"
        };

        self.overall.finish_with_message(msg.to_string());
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        // Ensure all spinners are cleaned up
        for (_, bar) in self.unit_bars.drain() {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_monitor_is_inert() {
        let mut monitor = ProgressMonitor::new(3, false);

        monitor.add_unit("a");
        monitor.retry_unit("a", 2);
        monitor.complete_unit("a", UnitState::Succeeded, 100);
        monitor.set_message("test");
        monitor.finish(true);
        assert!(monitor.unit_bars.is_empty());
    }

    #[test]
    fn enabled_monitor_tracks_spinners() {
        let mut monitor = ProgressMonitor::new(3, true);

        monitor.add_unit("a");
        monitor.add_unit("b");
        assert_eq!(monitor.unit_bars.len(), 2);

        monitor.complete_unit("a", UnitState::Succeeded, 100);
        monitor.complete_unit("b", UnitState::Blocked, 200);
        monitor.complete_unit("c", UnitState::Blocked, 0);

        monitor.update_level(0, 2);
        monitor.finish(false);
        assert!(monitor.unit_bars.is_empty());
        assert_eq!(monitor.overall.position(), 3);
    }
}
