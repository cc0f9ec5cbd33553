//! CLI module for restartd - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
