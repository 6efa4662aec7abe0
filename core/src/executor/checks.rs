//! Built-in checks and the registry for named ones.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;

use crate::error::CheckSpecError;
use crate::executor::traits::{CheckOutcome, UnitCheck};
use crate::executor::types::{CheckSpec, ExecutionOutput, Unit};

/// Checks registered by name, resolved from `named` descriptors.
#[derive(Clone, Default)]
pub struct CheckRegistry {
    checks: HashMap<String, Arc<dyn UnitCheck>>,
}

impl std::fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.checks.keys().collect();
        names.sort();
        f.debug_struct("CheckRegistry").field("checks", &names).finish()
    }
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `check` under its own name, replacing any previous entry.
    pub fn register(&mut self, check: Arc<dyn UnitCheck>) {
        self.checks.insert(check.name().to_string(), check);
    }

    pub fn with(mut self, check: Arc<dyn UnitCheck>) -> Self {
        self.register(check);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn UnitCheck>> {
        self.checks.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

/// Compile one descriptor into a runnable check.
pub fn build_check(
    spec: &CheckSpec,
    registry: &CheckRegistry,
) -> Result<Arc<dyn UnitCheck>, CheckSpecError> {
    let check: Arc<dyn UnitCheck> = match spec {
        CheckSpec::ExitCode { expect } => Arc::new(ExitCodeCheck { expect: *expect }),
        CheckSpec::OutputContains { text } => Arc::new(OutputContainsCheck { text: text.clone() }),
        CheckSpec::OutputMatches { pattern } => Arc::new(OutputMatchesCheck {
            regex: compile_regex(pattern)?,
        }),
        CheckSpec::OutputExcludes { pattern } => Arc::new(OutputExcludesCheck {
            regex: compile_regex(pattern)?,
        }),
        CheckSpec::FileExists { path } => Arc::new(FileExistsCheck {
            path: PathBuf::from(path),
        }),
        CheckSpec::JsonField { pointer, equals } => {
            if !pointer.is_empty() && !pointer.starts_with('/') {
                return Err(CheckSpecError::InvalidPointer(pointer.clone()));
            }
            Arc::new(JsonFieldCheck {
                pointer: pointer.clone(),
                equals: equals.clone(),
            })
        }
        CheckSpec::Named { name } => registry
            .get(name)
            .ok_or_else(|| CheckSpecError::UnknownNamedCheck(name.clone()))?,
    };
    Ok(check)
}

fn compile_regex(pattern: &str) -> Result<Regex, CheckSpecError> {
    Regex::new(pattern).map_err(|e| CheckSpecError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

pub struct ExitCodeCheck {
    pub expect: i32,
}

impl UnitCheck for ExitCodeCheck {
    fn name(&self) -> &str {
        "exit_code"
    }

    fn check(&self, _unit: &Unit, output: &ExecutionOutput) -> CheckOutcome {
        if output.exit_code == self.expect {
            Ok(())
        } else {
            Err(format!(
                "exit code {} (expected {})",
                output.exit_code, self.expect
            ))
        }
    }
}

pub struct OutputContainsCheck {
    pub text: String,
}

impl UnitCheck for OutputContainsCheck {
    fn name(&self) -> &str {
        "output_contains"
    }

    fn check(&self, _unit: &Unit, output: &ExecutionOutput) -> CheckOutcome {
        if output.stdout.contains(&self.text) {
            Ok(())
        } else {
            Err(format!("stdout does not contain '{}'", self.text))
        }
    }
}

pub struct OutputMatchesCheck {
    regex: Regex,
}

impl UnitCheck for OutputMatchesCheck {
    fn name(&self) -> &str {
        "output_matches"
    }

    fn check(&self, _unit: &Unit, output: &ExecutionOutput) -> CheckOutcome {
        if self.regex.is_match(&output.stdout) {
            Ok(())
        } else {
            Err(format!("stdout does not match /{}/", self.regex.as_str()))
        }
    }
}

pub struct OutputExcludesCheck {
    regex: Regex,
}

impl UnitCheck for OutputExcludesCheck {
    fn name(&self) -> &str {
        "output_excludes"
    }

    fn check(&self, _unit: &Unit, output: &ExecutionOutput) -> CheckOutcome {
        match self.regex.find(&output.stdout) {
            None => Ok(()),
            Some(m) => Err(format!(
                "stdout contains forbidden match '{}' for /{}/",
                m.as_str(),
                self.regex.as_str()
            )),
        }
    }
}

pub struct FileExistsCheck {
    pub path: PathBuf,
}

impl FileExistsCheck {
    fn resolve(&self, workdir: Option<&Path>) -> PathBuf {
        match workdir {
            Some(dir) if self.path.is_relative() => dir.join(&self.path),
            _ => self.path.clone(),
        }
    }
}

impl UnitCheck for FileExistsCheck {
    fn name(&self) -> &str {
        "file_exists"
    }

    fn check(&self, _unit: &Unit, output: &ExecutionOutput) -> CheckOutcome {
        let path = self.resolve(output.workdir.as_deref());
        if path.exists() {
            Ok(())
        } else {
            Err(format!("missing file: {}", path.display()))
        }
    }
}

pub struct JsonFieldCheck {
    pub pointer: String,
    pub equals: Option<serde_json::Value>,
}

impl UnitCheck for JsonFieldCheck {
    fn name(&self) -> &str {
        "json_field"
    }

    fn check(&self, _unit: &Unit, output: &ExecutionOutput) -> CheckOutcome {
        let value: serde_json::Value = serde_json::from_str(output.stdout.trim())
            .map_err(|e| format!("stdout is not valid JSON: {e}"))?;

        let Some(field) = value.pointer(&self.pointer) else {
            return Err(format!("json field '{}' is missing", self.pointer));
        };

        match &self.equals {
            Some(expected) if field != expected => Err(format!(
                "json field '{}' is {field}, expected {expected}",
                self.pointer
            )),
            None if field.is_null() => Err(format!("json field '{}' is null", self.pointer)),
            _ => Ok(()),
        }
    }
}
