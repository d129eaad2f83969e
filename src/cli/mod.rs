//! CLI module for stackfab.
//!
//! This module provides the command-line interface for running task chains
//! against a stack group.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
