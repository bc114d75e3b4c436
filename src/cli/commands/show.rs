//! Show command implementation
//!
//! This module implements the `show` command, which prints the current row
//! of one projection as JSON.

use super::{parse_lookup, report, CommandContext, ProjectionArg};
use clap::Args;
use std::path::Path;

/// Arguments for the show command
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Record key, key prefix or numeric row id
    pub lookup: String,

    /// Store to read from
    #[arg(long, value_enum, default_value = "deidentified")]
    pub projection: ProjectionArg,
}

impl ShowArgs {
    /// Execute the show command
    pub async fn execute(&self, config_path: &Path) -> anyhow::Result<i32> {
        let lookup = match parse_lookup(&self.lookup) {
            Ok(l) => l,
            Err(code) => return Ok(code),
        };
        let context = match CommandContext::open(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        let updater = match context.updater(self.projection.into()) {
            Ok(u) => u,
            Err(e) => return Ok(report("Setup", &e)),
        };

        match updater.load(&lookup).await {
            Ok(current) => {
                println!("{}", serde_json::to_string_pretty(&current)?);
                Ok(0)
            }
            Err(e) => Ok(report("Lookup", &e)),
        }
    }
}
