//! CLI wiring: merge flag overrides into the config, build plugins, and run one command.
use std::path::Path;

use gantry_core::api::{
    generate_run_id, load_unit_file, validate_and_layer, AppConfig, CheckRegistry,
    CheckpointValidator, CliError, EngineError, ExecutionEngine, Graph, LevelPlan,
};
use gantry_plugins::factory;

use crate::commands::cli::{PlanArgs, RunArgs, ValidateArgs};

/// A unit file that passed graph validation.
pub struct LoadedPlan {
    pub run_id: Option<String>,
    pub graph: Graph,
    pub plan: LevelPlan,
}

/// Load, build and layer a unit file. Every failure here happens before any
/// unit runs and maps to exit code 2 (20 when the file cannot be read).
pub fn load_plan(path: &Path) -> Result<LoadedPlan, CliError> {
    let file = load_unit_file(path)?;
    let graph = Graph::build(file.units).map_err(EngineError::from)?;
    let plan = validate_and_layer(&graph).map_err(EngineError::from)?;
    Ok(LoadedPlan {
        run_id: file.run_id,
        graph,
        plan,
    })
}

/// CLI flags win over file and environment settings.
pub fn apply_run_overrides(cfg: &mut AppConfig, args: &RunArgs) {
    let exec = &mut cfg.executor;
    if let Some(n) = args.max_attempts {
        exec.max_attempts = n;
    }
    if let Some(secs) = args.timeout {
        exec.per_unit_timeout_seconds = (secs > 0).then_some(secs);
    }
    if args.no_fail_fast {
        exec.fail_fast = false;
    }
    if let Some(n) = args.max_parallel {
        exec.max_parallel = n;
    }
    if let Some(format) = args.format {
        exec.output.format = format.as_str().to_string();
    }
    if args.progress {
        exec.output.progress_bar = true;
    }
}

#[tracing::instrument(name = "cli.run", skip(args, cfg), fields(unit_file = %args.unit_file.display()))]
pub async fn run(args: &RunArgs, mut cfg: AppConfig) -> Result<i32, CliError> {
    apply_run_overrides(&mut cfg, args);

    let retry = factory::build_retry_strategy(&cfg.executor.retry)
        .map_err(|e| CliError::Config(e.to_string()))?;
    let renderer = factory::build_renderer(&cfg.executor.output);
    let executor = factory::build_executor(&cfg, args.dry_run);

    let loaded = load_plan(&args.unit_file)?;
    let run_id = args
        .run_id
        .clone()
        .or(loaded.run_id)
        .unwrap_or_else(generate_run_id);
    tracing::debug!(run_id = %run_id, executor = executor.name(), "run initialized");

    let engine = ExecutionEngine::builder(cfg.executor.clone())
        .renderer(renderer)
        .retry_strategy(retry)
        .run_id(run_id)
        .build();
    let report = engine.run(&loaded.graph, &loaded.plan, executor).await?;

    let json = report
        .to_json_pretty()
        .map_err(|e| CliError::Anyhow(e.into()))?;
    if let Some(path) = &args.report {
        std::fs::write(path, &json)?;
    }
    println!("{json}");

    tracing::info!(run_id = %report.run_id(), summary = %report.summary(), "run finished");
    Ok(report.exit_code())
}

pub fn plan(args: &PlanArgs) -> Result<i32, CliError> {
    let loaded = load_plan(&args.unit_file)?;
    if args.json {
        let json = serde_json::to_string_pretty(&loaded.plan)
            .map_err(|e| CliError::Anyhow(e.into()))?;
        println!("{json}");
    } else {
        print!("{}", render_plan(&loaded.plan));
    }
    Ok(0)
}

pub fn validate(args: &ValidateArgs) -> Result<i32, CliError> {
    let loaded = load_plan(&args.unit_file)?;
    // Named checks are only available to embedders, so they fail here.
    CheckpointValidator::compile(&loaded.graph, &CheckRegistry::new())?;
    println!(
        "ok: {} units in {} levels, {} scope warnings",
        loaded.plan.unit_count(),
        loaded.plan.levels.len(),
        loaded.plan.warnings.len()
    );
    Ok(0)
}

fn render_plan(plan: &LevelPlan) -> String {
    let mut out = String::new();
    for level in &plan.levels {
        out.push_str(&format!("level {}: {}\n", level.index, level.unit_ids.join(", ")));
    }
    for warning in &plan.warnings {
        out.push_str(&format!("warning: {warning}\n"));
    }
    out
}
