use std::sync::Arc;

use anyhow::{bail, Result};

use gantry_core::api::{
    AppConfig, OutputConfig, OutputRendererPlugin, RetryConfig, RetryStrategyPlugin, UnitExecutor,
};

use crate::executor::{
    CommandExecutor, DryRunExecutor, ExponentialBackoffPlugin, ImmediateRetryPlugin,
    JsonlRendererPlugin, LinearRetryPlugin, TextRendererPlugin,
};

pub fn build_renderer(cfg: &OutputConfig) -> Arc<dyn OutputRendererPlugin> {
    match cfg.format.as_str() {
        "jsonl" => Arc::new(JsonlRendererPlugin::new(cfg.pretty_print)),
        "text" => Arc::new(TextRendererPlugin::new(cfg.ascii_only)),
        other => {
            tracing::warn!(format = %other, "unknown output format, falling back to text");
            Arc::new(TextRendererPlugin::new(cfg.ascii_only))
        }
    }
}

pub fn build_retry_strategy(cfg: &RetryConfig) -> Result<Arc<dyn RetryStrategyPlugin>> {
    let strategy: Arc<dyn RetryStrategyPlugin> = match cfg.strategy.as_str() {
        "immediate" => Arc::new(ImmediateRetryPlugin),
        "linear" => Arc::new(LinearRetryPlugin::new(cfg.clone())),
        "exponential-backoff" | "exponential" => {
            Arc::new(ExponentialBackoffPlugin::new(cfg.clone()))
        }
        other => bail!(
            "unknown retry strategy '{other}' (expected immediate, linear or exponential-backoff)"
        ),
    };
    Ok(strategy)
}

pub fn build_executor(cfg: &AppConfig, dry_run: bool) -> Arc<dyn UnitExecutor> {
    if dry_run {
        Arc::new(DryRunExecutor::new())
    } else {
        Arc::new(CommandExecutor::new(&cfg.command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renderer_follows_format() {
        let mut cfg = OutputConfig::default();
        assert_eq!(build_renderer(&cfg).format(), "text");

        cfg.format = "jsonl".to_string();
        assert_eq!(build_renderer(&cfg).format(), "jsonl");

        cfg.format = "yaml".to_string();
        assert_eq!(build_renderer(&cfg).format(), "text");
    }

    #[test]
    fn retry_strategy_by_name() {
        let mut cfg = RetryConfig::default();
        assert_eq!(build_retry_strategy(&cfg).unwrap().name(), "exponential-backoff");

        cfg.strategy = "linear".to_string();
        assert_eq!(build_retry_strategy(&cfg).unwrap().name(), "linear");

        cfg.strategy = "immediate".to_string();
        assert_eq!(build_retry_strategy(&cfg).unwrap().name(), "immediate");

        cfg.strategy = "random".to_string();
        let err = build_retry_strategy(&cfg).err().unwrap();
        assert!(err.to_string().contains("random"));
    }

    #[test]
    fn executor_honours_dry_run() {
        let cfg = AppConfig::default();
        assert_eq!(build_executor(&cfg, true).name(), "dry-run");
        assert_eq!(build_executor(&cfg, false).name(), "command");
    }
}
