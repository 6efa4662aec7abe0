pub mod check;
pub mod executor;
pub mod renderer;
pub mod strategy;

pub use check::*;
pub use executor::*;
pub use renderer::*;
pub use strategy::*;
