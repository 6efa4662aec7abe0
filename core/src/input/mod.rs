//! Unit file loading
//!
//! A unit file declares the units of one run, as JSON or TOML:
//! - JSON: `{ "run_id": "...", "units": [...] }` or a bare array of units
//! - TOML: optional `run_id` plus `[[units]]` tables
//!
//! The format follows the file extension; anything that is not `.toml` is
//! read as JSON.

mod parser;

pub use parser::{load_unit_file, parse_unit_file, UnitFile, UnitFileFormat};
