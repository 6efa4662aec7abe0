mod load;
mod types;

pub use load::{apply_env_overrides, get_gantry_data_dir, load, load_default, load_from};
pub use types::{AppConfig, CommandConfig, LoggingConfig};
