pub mod code;
#[allow(clippy::module_inception)]
pub mod error;
pub mod executor;

pub use code::ErrorCode;
pub use error::{CliError, InputError};
pub use executor::{CheckSpecError, EngineError, ExecutionError, GraphError, ScopeConflict};
