pub mod check;
pub mod config;
pub mod result;
pub mod unit;

pub use check::*;
pub use config::*;
pub use result::*;
pub use unit::*;
