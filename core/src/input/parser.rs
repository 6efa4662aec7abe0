use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::executor::types::UnitSpec;

/// Parsed unit file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitFile {
    #[serde(default)]
    pub run_id: Option<String>,
    pub units: Vec<UnitSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitFileFormat {
    Json,
    Toml,
}

impl UnitFileFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

/// JSON accepts either the full document or a bare list of units.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonDocument {
    Full(UnitFile),
    Units(Vec<UnitSpec>),
}

/// Read and parse the unit file at `path`.
pub fn load_unit_file(path: &Path) -> Result<UnitFile, InputError> {
    let text = std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file = parse_unit_file(&text, UnitFileFormat::from_path(path), path)?;
    tracing::debug!(
        path = %path.display(),
        units = file.units.len(),
        "unit file loaded"
    );
    Ok(file)
}

/// Parse unit file text; `origin` is only used in error messages.
pub fn parse_unit_file(
    text: &str,
    format: UnitFileFormat,
    origin: &Path,
) -> Result<UnitFile, InputError> {
    let parse_err = |reason: String| InputError::Parse {
        path: origin.to_path_buf(),
        reason,
    };

    let file = match format {
        UnitFileFormat::Toml => {
            toml::from_str::<UnitFile>(text).map_err(|e| parse_err(e.to_string()))?
        }
        UnitFileFormat::Json => match serde_json::from_str::<JsonDocument>(text) {
            Ok(JsonDocument::Full(file)) => file,
            Ok(JsonDocument::Units(units)) => UnitFile { run_id: None, units },
            // Re-parse strictly so the message points at the real problem.
            Err(_) => serde_json::from_str::<UnitFile>(text).map_err(|e| parse_err(e.to_string()))?,
        },
    };

    if file.units.is_empty() {
        return Err(InputError::Empty(PathBuf::from(origin)));
    }
    Ok(file)
}
