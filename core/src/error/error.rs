use std::path::PathBuf;

use thiserror::Error;

use super::code::ErrorCode;
use super::executor::EngineError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("engine failed: {0}")]
    Engine(#[from] EngineError),
    #[error("input error: {0}")]
    Input(#[from] InputError),
    #[error("command failed: {0}")]
    Command(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl CliError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Engine(e) => e.error_code(),
            Self::Input(e) => e.error_code(),
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Command(_) | Self::Io(_) => ErrorCode::IoError,
            Self::Anyhow(_) => ErrorCode::InternalError,
        }
    }
}

/// Errors raised while loading a unit file.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("cannot read unit file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse unit file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error("unit file {0} declares no units")]
    Empty(PathBuf),
}

impl InputError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Io { .. } => ErrorCode::IoError,
            Self::Parse { .. } | Self::Empty(_) => ErrorCode::ValidationError,
        }
    }
}
