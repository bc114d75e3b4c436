//! Demo command implementation
//!
//! This module implements the `demo` command, which marks a record as demo
//! data (or clears the mark) in both stores.

use super::{parse_lookup, report, CommandContext};
use clap::Args;
use std::path::Path;

/// Arguments for the demo command
#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Record key, key prefix or numeric row id (resolved in the de-identified store)
    pub lookup: String,

    /// Clear the demo flag instead of setting it
    #[arg(long)]
    pub unset: bool,
}

impl DemoArgs {
    /// Execute the demo command
    pub async fn execute(&self, config_path: &Path) -> anyhow::Result<i32> {
        let lookup = match parse_lookup(&self.lookup) {
            Ok(l) => l,
            Err(code) => return Ok(code),
        };
        let context = match CommandContext::open(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        let is_demo = !self.unset;
        tracing::info!(lookup = %lookup.describe(), is_demo, dry_run = context.dry_run(), "Setting demo flag");

        let target = match context.edit_target(&lookup).await {
            Ok(t) => t,
            Err(e) => return Ok(report("Lookup", &e)),
        };
        let editor = match context.editor_on(&target) {
            Ok(e) => e,
            Err(e) => return Ok(report("Setup", &e)),
        };

        match editor.set_demo(&lookup, is_demo).await {
            Ok(change) => {
                if context.dry_run() {
                    println!("🧪 Dry run: no store was modified");
                }
                println!(
                    "✅ Demo flag {}: identifying {}, deidentified {}",
                    if is_demo { "set" } else { "cleared" },
                    describe(change.identifying),
                    describe(change.deidentified)
                );
                Ok(0)
            }
            Err(e) => Ok(report("Demo update", &e)),
        }
    }
}

fn describe(changed: bool) -> &'static str {
    if changed {
        "updated"
    } else {
        "unchanged"
    }
}
