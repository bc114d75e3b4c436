//! History command implementation
//!
//! This module implements the `history` command, which lists the backup rows
//! of a record, oldest first.

use super::{report, CommandContext, ProjectionArg};
use crate::domain::RecordKey;
use clap::Args;
use std::path::Path;

/// Arguments for the history command
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Full record key
    pub record_key: String,

    /// Store to read from
    #[arg(long, value_enum, default_value = "deidentified")]
    pub projection: ProjectionArg,

    /// Print full backup rows as JSON instead of a summary table
    #[arg(long)]
    pub json: bool,
}

impl HistoryArgs {
    /// Execute the history command
    pub async fn execute(&self, config_path: &Path) -> anyhow::Result<i32> {
        let record_key = match RecordKey::new(self.record_key.clone()) {
            Ok(k) => k,
            Err(e) => return Ok(report("Key parsing", &e)),
        };
        let context = match CommandContext::open(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };
        let updater = match context.updater(self.projection.into()) {
            Ok(u) => u,
            Err(e) => return Ok(report("Setup", &e)),
        };

        let backups = match updater.load_backups(&record_key).await {
            Ok(b) => b,
            Err(e) => return Ok(report("History lookup", &e)),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&backups)?);
            return Ok(0);
        }

        if backups.is_empty() {
            println!("No backups for {}.", record_key.short());
            return Ok(0);
        }

        println!("Found {} backup(s):", backups.len());
        println!();
        println!("{:<12} {:<10}", "Backup ID", "Demo");
        println!("{}", "-".repeat(24));
        for backup in &backups {
            let demo = backup
                .content
                .get("isDemo")
                .and_then(|v| v.as_bool())
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("{:<12} {:<10}", backup.row_id.to_string(), demo);
        }
        println!();
        Ok(0)
    }
}
