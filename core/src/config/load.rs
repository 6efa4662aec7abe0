use std::path::{Path, PathBuf};

use anyhow::Context;

use super::types::AppConfig;

/// Get the default gantry data directory: ~/.gantry
pub fn get_gantry_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".gantry"))
}

/// Read and parse one config file.
pub fn load_from(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str::<AppConfig>(&s)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

/// Load config: explicit path, else ~/.gantry/config.toml, else
/// ./gantry.toml, else defaults. Environment overrides are applied last.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    let mut cfg = match explicit {
        Some(path) => {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            load_from(Path::new(&expanded))?
        }
        None => load_discovered()?,
    };

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    load(None)
}

fn load_discovered() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.gantry/config.toml
    let gantry_dir = get_gantry_data_dir().ok();
    let user_config = gantry_dir.as_ref().map(|dir| dir.join("config.toml"));

    // Priority 2: ./gantry.toml (current directory)
    let local_config = Path::new("gantry.toml");

    let mut cfg = match user_config {
        Some(ref path) if path.exists() => load_from(path)?,
        _ if local_config.exists() => load_from(local_config)?,
        _ => AppConfig::default(),
    };

    // File logs default to ~/.gantry/logs
    let directory_unset = cfg
        .logging
        .directory
        .as_ref()
        .map(|s| s.trim().is_empty())
        .unwrap_or(true);
    if directory_unset {
        if let Some(dir) = gantry_dir {
            cfg.logging.directory = Some(dir.join("logs").to_string_lossy().to_string());
        }
    }

    Ok(cfg)
}

/// Apply `GANTRY_*` overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = var("GANTRY_MAX_ATTEMPTS") {
        cfg.executor.max_attempts = v
            .trim()
            .parse()
            .with_context(|| format!("GANTRY_MAX_ATTEMPTS must be a non-negative integer, got '{v}'"))?;
    }
    if let Some(v) = var("GANTRY_UNIT_TIMEOUT_SECS") {
        let secs: u64 = v
            .trim()
            .parse()
            .with_context(|| format!("GANTRY_UNIT_TIMEOUT_SECS must be an integer, got '{v}'"))?;
        cfg.executor.per_unit_timeout_seconds = (secs > 0).then_some(secs);
    }
    if let Some(v) = var("GANTRY_FAIL_FAST") {
        cfg.executor.fail_fast = parse_bool(&v)
            .with_context(|| format!("GANTRY_FAIL_FAST must be true or false, got '{v}'"))?;
    }
    if let Some(v) = var("GANTRY_LOG_LEVEL") {
        cfg.logging.level = v.trim().to_string();
    }

    Ok(())
}

fn parse_bool(v: &str) -> anyhow::Result<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!("not a boolean")),
    }
}
