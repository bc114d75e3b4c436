//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{PostgreSQLConfig, SplitStoreConfig};
use super::secret_string;
use crate::domain::errors::SplitStoreError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Config file used when neither `--config` nor `SPLITSTORE_CONFIG` is given
pub const DEFAULT_CONFIG_FILE: &str = "splitstore.toml";

/// Resolves the configuration file path
///
/// An explicit path wins, then `SPLITSTORE_CONFIG`, then
/// [`DEFAULT_CONFIG_FILE`] in the working directory.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("SPLITSTORE_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into SplitStoreConfig
/// 4. Applies environment variable overrides (SPLITSTORE_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns a `Configuration` error if the file can't be read or parsed, a
/// referenced variable is unset, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use splitstore::config::loader::load_config;
///
/// let config = load_config("splitstore.toml").expect("Failed to load config");
/// println!("{}", config.records.record_type);
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<SplitStoreConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(SplitStoreError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        SplitStoreError::Configuration(format!(
            "Failed to read configuration file {}: {e}",
            path.display()
        ))
    })?;

    parse_config(&contents)
}

/// Parses, overrides and validates configuration text
///
/// # Errors
///
/// Same as [`load_config`], minus file access.
pub fn parse_config(contents: &str) -> Result<SplitStoreConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: SplitStoreConfig = toml::from_str(&contents)
        .map_err(|e| SplitStoreError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        SplitStoreError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static regex is valid")
    })
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched, so a commented-out example doesn't
/// require its variable to be set.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = placeholder_pattern();
    let mut missing_vars: Vec<String> = Vec::new();

    let lines: Vec<String> = input
        .lines()
        .map(|line| {
            if line.trim_start().starts_with('#') {
                return line.to_string();
            }
            re.replace_all(line, |cap: &regex::Captures<'_>| {
                let var_name = &cap[1];
                std::env::var(var_name).unwrap_or_else(|_| {
                    if !missing_vars.iter().any(|m| m == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                })
            })
            .into_owned()
        })
        .collect();

    if !missing_vars.is_empty() {
        return Err(SplitStoreError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    let mut result = lines.join("\n");
    if input.ends_with('\n') {
        result.push('\n');
    }
    Ok(result)
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn apply_store_overrides(section: &str, store: &mut PostgreSQLConfig) {
    if let Ok(val) = std::env::var(format!("SPLITSTORE_{section}_CONNECTION_STRING")) {
        store.connection_string = secret_string(val);
    }
    if let Ok(val) = std::env::var(format!("SPLITSTORE_{section}_MAX_CONNECTIONS")) {
        if let Ok(max) = val.parse() {
            store.max_connections = max;
        }
    }
    if let Ok(val) = std::env::var(format!("SPLITSTORE_{section}_STATEMENT_TIMEOUT_SECONDS")) {
        if let Ok(secs) = val.parse() {
            store.statement_timeout_seconds = secs;
        }
    }
    if let Ok(val) = std::env::var(format!("SPLITSTORE_{section}_SSL_MODE")) {
        store.ssl_mode = val;
    }
}

/// Applies environment variable overrides using SPLITSTORE_* prefix
///
/// Environment variables follow the pattern: SPLITSTORE_<SECTION>_<KEY>
/// For example: SPLITSTORE_DEIDENTIFIED_CONNECTION_STRING,
/// SPLITSTORE_APPLICATION_LOG_LEVEL
fn apply_env_overrides(config: &mut SplitStoreConfig) {
    if let Ok(val) = std::env::var("SPLITSTORE_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(dry_run) = env_flag("SPLITSTORE_APPLICATION_DRY_RUN") {
        config.application.dry_run = dry_run;
    }

    apply_store_overrides("IDENTIFYING", &mut config.identifying);
    apply_store_overrides("DEIDENTIFIED", &mut config.deidentified);

    if let Ok(val) = std::env::var("SPLITSTORE_RECORDS_TABLE_PREFIX") {
        config.records.table_prefix = val;
    }
    if let Ok(val) = std::env::var("SPLITSTORE_RECORDS_RECORD_TYPE") {
        config.records.record_type = val;
    }
    if let Ok(val) = std::env::var("SPLITSTORE_RECORDS_EXPORT_MARKER_TABLE") {
        config.records.export_marker_table = val;
    }

    if let Some(enabled) = env_flag("SPLITSTORE_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = enabled;
    }
    if let Ok(val) = std::env::var("SPLITSTORE_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("SPLITSTORE_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }
}
