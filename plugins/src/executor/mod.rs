pub mod command;
pub mod dry_run;
pub mod renderers;
pub mod strategies;

pub use command::CommandExecutor;
pub use dry_run::DryRunExecutor;
pub use renderers::{JsonlRendererPlugin, TextRendererPlugin};
pub use strategies::{ExponentialBackoffPlugin, ImmediateRetryPlugin, LinearRetryPlugin};
