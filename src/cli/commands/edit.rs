//! Edit command implementation
//!
//! This module implements the `edit` command, which replaces the content of
//! one projection with a JSON document read from a file. The old row is
//! backed up and the export marker invalidated like any other edit.

use super::{parse_lookup, report, CommandContext, ProjectionArg};
use clap::Args;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Arguments for the edit command
#[derive(Args, Debug)]
pub struct EditArgs {
    /// Record key, key prefix or numeric row id (resolved in the de-identified store)
    pub lookup: String,

    /// Projection to replace
    #[arg(long, value_enum)]
    pub projection: ProjectionArg,

    /// JSON file holding the new content
    #[arg(long)]
    pub file: PathBuf,
}

impl EditArgs {
    /// Execute the edit command
    pub async fn execute(&self, config_path: &Path) -> anyhow::Result<i32> {
        let lookup = match parse_lookup(&self.lookup) {
            Ok(l) => l,
            Err(code) => return Ok(code),
        };

        let content: Value = match fs::read_to_string(&self.file)
            .map_err(anyhow::Error::from)
            .and_then(|raw| serde_json::from_str(&raw).map_err(anyhow::Error::from))
        {
            Ok(v) => v,
            Err(e) => {
                println!("❌ Failed to read content from {}", self.file.display());
                println!("   Error: {e}");
                return Ok(5);
            }
        };

        let context = match CommandContext::open(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };
        let target = match context.edit_target(&lookup).await {
            Ok(t) => t,
            Err(e) => return Ok(report("Lookup", &e)),
        };
        let editor = match context.editor_on(&target) {
            Ok(e) => e,
            Err(e) => return Ok(report("Setup", &e)),
        };

        let record = match editor.load(&lookup).await {
            Ok(r) => r,
            Err(e) => return Ok(report("Lookup", &e)),
        };

        let outcome = match self.projection {
            ProjectionArg::Identifying => {
                editor
                    .update_identifying(&record.identifying, content)
                    .await
            }
            ProjectionArg::Deidentified => {
                editor
                    .update_deidentified(&record.deidentified, content)
                    .await
            }
        };

        match outcome {
            Ok(changed) => {
                if context.dry_run() {
                    println!("🧪 Dry run: no store was modified");
                }
                if changed {
                    println!(
                        "✅ {} content of {} replaced; previous version backed up",
                        self.projection_label(),
                        record.deidentified.record_key.short()
                    );
                } else {
                    println!("ℹ️  Content identical, nothing written");
                }
                Ok(0)
            }
            Err(e) => Ok(report("Edit", &e)),
        }
    }

    fn projection_label(&self) -> &'static str {
        match self.projection {
            ProjectionArg::Identifying => "Identifying",
            ProjectionArg::Deidentified => "De-identified",
        }
    }
}
