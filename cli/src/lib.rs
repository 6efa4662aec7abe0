//! gantry-cli library, exposed so the command wiring can be unit tested

pub mod app;
pub mod commands;
