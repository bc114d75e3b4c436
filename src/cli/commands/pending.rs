//! Pending command implementation
//!
//! This module implements the `pending` command, which lists de-identified
//! records that have no export marker.

use super::{report, CommandContext};
use crate::core::export::ExportMarkers;
use clap::Args;
use std::path::Path;

/// Arguments for the pending command
#[derive(Args, Debug)]
pub struct PendingArgs {
    /// Maximum number of records to list
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
}

impl PendingArgs {
    /// Execute the pending command
    pub async fn execute(&self, config_path: &Path) -> anyhow::Result<i32> {
        tracing::info!(limit = self.limit, "Listing records pending export");

        let context = match CommandContext::open(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        let markers = match context
            .config
            .records
            .deidentified_tables()
            .and_then(|tables| ExportMarkers::new(context.stores.deidentified.clone(), tables))
        {
            Ok(m) => m,
            Err(e) => return Ok(report("Setup", &e)),
        };

        let pending = match markers.pending(self.limit).await {
            Ok(p) => p,
            Err(e) => return Ok(report("Pending lookup", &e)),
        };

        if pending.is_empty() {
            println!("No records pending export.");
            return Ok(0);
        }

        println!("📦 {} record(s) pending export:", pending.len());
        println!();
        println!("{:<12} {:<40}", "Row ID", "Record Key");
        println!("{}", "-".repeat(52));
        for record in &pending {
            println!(
                "{:<12} {:<40}",
                record.row_id.to_string(),
                record.record_key.to_string()
            );
        }
        println!();
        Ok(0)
    }
}
