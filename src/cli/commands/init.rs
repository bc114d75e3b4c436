//! Init command implementation
//!
//! This module implements the `init` command. By default it creates the
//! record tables in both stores; with `--sample-config` it writes a starter
//! configuration file instead.

use super::{report, CommandContext};
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Write a sample configuration file to this path instead of creating tables
    #[arg(long)]
    pub sample_config: Option<PathBuf>,

    /// Overwrite an existing sample configuration file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self, config_path: &Path) -> anyhow::Result<i32> {
        match &self.sample_config {
            Some(output) => Ok(self.write_sample_config(output)),
            None => Ok(Self::create_tables(config_path).await),
        }
    }

    async fn create_tables(config_path: &Path) -> i32 {
        tracing::info!("Creating record tables");
        println!("🗄️  Initializing record tables");
        println!();

        let context = match CommandContext::open(config_path) {
            Ok(c) => c,
            Err(code) => return code,
        };

        if let Err(e) = context.stores.test_connections().await {
            return report("Connection check", &e);
        }
        if let Err(e) = context.stores.ensure_tables(&context.config.records).await {
            return report("Table creation", &e);
        }

        let records = &context.config.records;
        println!("✅ Tables ready");
        println!(
            "  Identifying store: {p}_current_{t}, {p}_backup_{t}",
            p = records.table_prefix,
            t = records.record_type
        );
        println!(
            "  De-identified store: {p}_current_{t}, {p}_backup_{t}, {m}",
            p = records.table_prefix,
            t = records.record_type,
            m = records.export_marker_table
        );
        println!();
        0
    }

    fn write_sample_config(&self, output: &Path) -> i32 {
        tracing::info!(output = %output.display(), "Writing sample configuration file");

        if output.exists() && !self.force {
            println!("❌ Configuration file already exists: {}", output.display());
            println!("   Use --force to overwrite");
            return 2;
        }

        match fs::write(output, SAMPLE_CONFIG) {
            Ok(()) => {
                println!("✅ Configuration file created: {}", output.display());
                println!();
                println!("Next steps:");
                println!("  1. Set SPLITSTORE_PII_DATABASE_URL and SPLITSTORE_NONPII_DATABASE_URL");
                println!("     (a .env file next to the binary works too)");
                println!("  2. Validate configuration: splitstore validate-config");
                println!("  3. Create tables: splitstore init");
                println!();
                0
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                5
            }
        }
    }
}

/// Starter configuration written by `init --sample-config`
pub const SAMPLE_CONFIG: &str = r#"# splitstore configuration

[application]
log_level = "info"          # trace | debug | info | warn | error
dry_run = false             # edits run against an in-memory copy when true

# Store holding the identifying (PII) projection
[identifying]
connection_string = "${SPLITSTORE_PII_DATABASE_URL}"
max_connections = 10
connection_timeout_seconds = 30
statement_timeout_seconds = 60
ssl_mode = "prefer"         # disable | allow | prefer | require | verify-ca | verify-full

# Store holding the de-identified projection and export markers
[deidentified]
connection_string = "${SPLITSTORE_NONPII_DATABASE_URL}"
max_connections = 10
connection_timeout_seconds = 30
statement_timeout_seconds = 60
ssl_mode = "prefer"

[records]
table_prefix = "fever"
record_type = "surveys"
export_marker_table = "fever_export_markers"

[logging]
local_enabled = false
local_path = "/var/log/splitstore"
local_rotation = "daily"    # daily | hourly
"#;
