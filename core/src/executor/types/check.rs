use serde::{Deserialize, Serialize};

/// Declarative checkpoint attached to a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSpec {
    #[serde(default = "default_checkpoint_name")]
    pub name: String,

    /// Empty means an implicit `exit_code { expect = 0 }`.
    #[serde(default)]
    pub checks: Vec<CheckSpec>,
}

impl Default for CheckpointSpec {
    fn default() -> Self {
        Self {
            name: default_checkpoint_name(),
            checks: Vec::new(),
        }
    }
}

impl CheckpointSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            checks: Vec::new(),
        }
    }

    pub fn with_check(mut self, check: CheckSpec) -> Self {
        self.checks.push(check);
        self
    }
}

fn default_checkpoint_name() -> String {
    "default".to_string()
}

/// One check descriptor. Compiled into a [`UnitCheck`](crate::executor::traits::UnitCheck)
/// before the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckSpec {
    ExitCode {
        #[serde(default)]
        expect: i32,
    },
    OutputContains {
        text: String,
    },
    OutputMatches {
        pattern: String,
    },
    OutputExcludes {
        pattern: String,
    },
    FileExists {
        path: String,
    },
    JsonField {
        pointer: String,
        #[serde(default)]
        equals: Option<serde_json::Value>,
    },
    /// A check registered on the engine under `name`.
    Named {
        name: String,
    },
}
