use serde::{Deserialize, Serialize};

use crate::executor::types::ExecutionConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub executor: ExecutionConfig,

    #[serde(default)]
    pub command: CommandConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "gantry_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: false,
            level: default_logging_level(),
            directory: None,
        }
    }
}

/// Settings for the shell command executor (`[command]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Shell used as `<shell> -c <command>`.
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Working directory for commands; defaults to the current directory.
    #[serde(default)]
    pub workdir: Option<String>,

    /// Max bytes kept from each of stdout/stderr (tail).
    #[serde(default = "default_capture_bytes")]
    pub capture_bytes: usize,
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_capture_bytes() -> usize {
    64 * 1024
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            workdir: None,
            capture_bytes: default_capture_bytes(),
        }
    }
}
