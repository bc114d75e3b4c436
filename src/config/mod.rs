//! Configuration management for splitstore.
//!
//! # Overview
//!
//! splitstore uses one TOML file describing both stores, with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `SPLITSTORE_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use splitstore::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("splitstore.toml")?;
//! let tables = config.records.deidentified_tables()?;
//! println!("current table: {}", tables.current());
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [identifying]
//! connection_string = "${SPLITSTORE_PII_DATABASE_URL}"
//!
//! [deidentified]
//! connection_string = "${SPLITSTORE_NONPII_DATABASE_URL}"
//! ssl_mode = "require"
//!
//! [records]
//! table_prefix = "fever"
//! record_type = "surveys"
//! export_marker_table = "fever_export_markers"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{config_path, load_config, parse_config, DEFAULT_CONFIG_FILE};
pub use schema::{
    ApplicationConfig, LoggingConfig, PostgreSQLConfig, RecordsConfig, SplitStoreConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
