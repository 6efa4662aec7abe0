use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use gantry_core::api::{
    CommandConfig, ExecutionContext, ExecutionError, ExecutionOutput, Unit, UnitExecutor,
};
use tokio::process::Command;

/// Runs a unit's `command` through `<shell> -c`.
///
/// The child is killed when the attempt future is dropped, which is how the
/// engine's per-unit timeout reaches the process.
pub struct CommandExecutor {
    shell: String,
    workdir: Option<PathBuf>,
    capture_bytes: usize,
}

impl CommandExecutor {
    pub fn new(cfg: &CommandConfig) -> Self {
        Self {
            shell: cfg.shell.clone(),
            workdir: cfg
                .workdir
                .as_deref()
                .filter(|d| !d.trim().is_empty())
                .map(|d| PathBuf::from(shellexpand::tilde(d).into_owned())),
            capture_bytes: cfg.capture_bytes,
        }
    }

    fn resolve_workdir(&self) -> Result<PathBuf, ExecutionError> {
        match &self.workdir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    fn build_command(
        &self,
        script: &str,
        workdir: &Path,
        unit: &Unit,
        ctx: &ExecutionContext,
    ) -> Result<Command, ExecutionError> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(script)
            .current_dir(workdir)
            .env("GANTRY_RUN_ID", &ctx.run_id)
            .env("GANTRY_UNIT_ID", &unit.id)
            .env("GANTRY_ATTEMPT", ctx.attempt.to_string())
            .env("GANTRY_SCOPE", unit.scope_patterns().collect::<Vec<_>>().join(","))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(prior) = &ctx.prior_failures {
            let json = serde_json::to_string(prior)
                .map_err(|e| ExecutionError::Failed(format!("encode prior failures: {e}")))?;
            cmd.env("GANTRY_PRIOR_FAILURES", json);
        }

        Ok(cmd)
    }
}

#[async_trait]
impl UnitExecutor for CommandExecutor {
    fn name(&self) -> &str {
        "command"
    }

    async fn execute(
        &self,
        unit: &Unit,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionOutput, ExecutionError> {
        let Some(script) = unit.command.as_deref().filter(|c| !c.trim().is_empty()) else {
            return Err(ExecutionError::Failed(format!(
                "unit '{}' has no command",
                unit.id
            )));
        };

        let workdir = self.resolve_workdir()?;
        let mut cmd = self.build_command(script, &workdir, unit, ctx)?;

        tracing::debug!(
            unit_id = %unit.id,
            attempt = ctx.attempt,
            shell = %self.shell,
            workdir = %workdir.display(),
            "spawning unit command"
        );

        let started = Instant::now();
        let output = cmd.output().await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        // Killed by a signal: no exit code.
        let exit_code = output.status.code().unwrap_or(-1);
        tracing::debug!(unit_id = %unit.id, exit_code, duration_ms, "unit command exited");

        Ok(ExecutionOutput {
            exit_code,
            stdout: tail(&output.stdout, self.capture_bytes),
            stderr: tail(&output.stderr, self.capture_bytes),
            duration_ms,
            workdir: Some(workdir),
            metadata: serde_json::json!({ "shell": self.shell }),
        })
    }
}

/// Last `max` bytes of `bytes`, decoded lossily.
fn tail(bytes: &[u8], max: usize) -> String {
    let start = bytes.len().saturating_sub(max);
    String::from_utf8_lossy(&bytes[start..]).into_owned()
}
