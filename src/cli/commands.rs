//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: supervise the worker (default)
//! - config: print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// restartd - keeps a single worker process alive
#[derive(Parser, Debug)]
#[command(name = "restartd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Supervise the worker until it exits cleanly or a signal arrives
    Run {
        /// Disable hot reload on source changes
        #[arg(long)]
        no_watch: bool,

        /// Worker command line, overriding the configured one
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Print the effective configuration as YAML
    Config,
}
