//! CLI layer for kernel-roulette.
//!
//! Provides the command-line interface using clap, with commands for
//! spinning the device, inspecting it and running concurrent simulations.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
