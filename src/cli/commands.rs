//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stackfab - task-style lifecycle management for CloudFormation stack groups.
#[derive(Parser, Debug)]
#[command(name = "stackfab")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "STACKFAB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a chain of tasks in order.
    ///
    /// Each task is written `name[:arg,key=value]`, for example
    /// `set_env:EnvName=production update_foo`.
    Run {
        /// Tasks to run, in order.
        #[arg(required = true)]
        tasks: Vec<String>,
    },

    /// List the tasks generated from the configuration.
    Tasks,

    /// Initialize a new stackfab project.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_task_chain() {
        let cli = Cli::try_parse_from([
            "stackfab",
            "--output",
            "json",
            "run",
            "set_env:EnvName=production",
            "update_foo",
        ])
        .unwrap();

        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::Run { tasks } => {
                assert_eq!(tasks, vec!["set_env:EnvName=production", "update_foo"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_run_requires_a_task() {
        assert!(Cli::try_parse_from(["stackfab", "run"]).is_err());
    }
}
