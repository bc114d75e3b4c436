//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for splitstore using clap.
//! It is the operator's tool for inspecting and correcting individual records.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// splitstore - record maintenance for split identifying/de-identified stores
#[derive(Parser, Debug)]
#[command(name = "splitstore")]
#[command(version, about, long_about = None)]
#[command(author = "Splitstore Contributors")]
pub struct Cli {
    /// Path to configuration file [default: splitstore.toml]
    #[arg(short, long, env = "SPLITSTORE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "SPLITSTORE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the current row of a record
    Show(commands::show::ShowArgs),

    /// List the backup history of a record
    History(commands::history::HistoryArgs),

    /// Set or clear the demo flag on both projections
    Demo(commands::demo::DemoArgs),

    /// Replace the content of one projection from a JSON file
    Edit(commands::edit::EditArgs),

    /// List de-identified records waiting for export
    Pending(commands::pending::PendingArgs),

    /// Create the record tables in both stores
    Init(commands::init::InitArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),
}
