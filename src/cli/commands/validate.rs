//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the splitstore configuration file.

use crate::adapters::postgresql::client::redact_connection_string;
use crate::config::load_config;
use clap::Args;
use secrecy::ExposeSecret;
use std::path::Path;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &Path) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path.display(), "Validating configuration");

        println!("🔍 Validating configuration file: {}", config_path.display());
        println!();

        // Loading also applies overrides and validates
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration is valid");
                c
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        for (label, pg) in [
            ("Identifying", &config.identifying),
            ("De-identified", &config.deidentified),
        ] {
            println!(
                "  {label} Store: {} (max {} connections, ssl {})",
                redact_connection_string(pg.connection_string.expose_secret().as_ref()),
                pg.max_connections,
                pg.ssl_mode
            );
        }
        println!(
            "  Record Tables: {}_{}",
            config.records.table_prefix, config.records.record_type
        );
        println!("  Export Markers: {}", config.records.export_marker_table);
        println!(
            "  File Logging: {}",
            if config.logging.local_enabled {
                config.logging.local_path.as_str()
            } else {
                "disabled"
            }
        );
        println!();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_validate_missing_file() {
        let args = ValidateArgs {};
        let code = args
            .execute(Path::new("/nonexistent/splitstore.toml"))
            .await
            .unwrap();
        assert_eq!(code, 2);
    }

    #[tokio::test]
    async fn test_validate_invalid_ssl_mode() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[identifying]
connection_string = "postgresql://pii@localhost:5432/pii"
ssl_mode = "sometimes"

[deidentified]
connection_string = "postgresql://app@localhost:5432/app"

[records]
table_prefix = "fever"
record_type = "surveys"
export_marker_table = "fever_export_markers"
"#
        )
        .unwrap();

        let code = ValidateArgs {}.execute(file.path()).await.unwrap();
        assert_eq!(code, 2);
    }
}
