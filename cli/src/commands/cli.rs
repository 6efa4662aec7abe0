use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Jsonl,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Jsonl => "jsonl",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "gantry", version, about = "Run dependency-gated units in parallel")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file; defaults to ~/.gantry/config.toml, then ./gantry.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Unit file (.json or .toml)
    pub unit_file: PathBuf,

    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Per-attempt timeout in seconds; 0 disables it
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Keep running independent units after one ends blocked
    #[arg(long)]
    pub no_fail_fast: bool,

    /// Max units running at once inside a level (0 = unbounded)
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Event format on stderr
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    #[arg(long)]
    pub progress: bool,

    /// Plan and check every unit without running commands
    #[arg(long)]
    pub dry_run: bool,

    /// Also write the JSON report to this file
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    #[arg(long)]
    pub run_id: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PlanArgs {
    pub unit_file: PathBuf,

    /// Print the plan as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ValidateArgs {
    pub unit_file: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute the units level by level and print the run report
    Run(RunArgs),
    /// Show execution levels and scope overlap warnings
    Plan(PlanArgs),
    /// Check the unit file without executing anything
    Validate(ValidateArgs),
}
