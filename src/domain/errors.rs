//! Domain error types
//!
//! This module defines the error hierarchy for splitstore. All errors are
//! domain-specific and don't expose third-party types; adapter code converts
//! driver and pool errors into [`SplitStoreError::Database`] at the boundary.

use thiserror::Error;

/// Main splitstore error type
///
/// Lookup and key errors are always surfaced to the immediate caller and are
/// never retried by this crate. An advisory lock that is already held is not
/// an error at all; it is reported through the `on_not_acquired` branch of
/// [`crate::core::lock::LockManager::run_if_free`].
#[derive(Debug, Error)]
pub enum SplitStoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Database-related errors (connection, query, transaction)
    #[error("Database error: {0}")]
    Database(String),

    /// A keyed lookup matched no row
    #[error("No {label} row matches key '{key}'")]
    RecordNotFound { label: String, key: String },

    /// A keyed lookup matched more than one row
    #[error("Expected exactly 1 {label} row to match key '{key}', but got {count}")]
    AmbiguousRecord {
        label: String,
        key: String,
        count: usize,
    },

    /// A row id was given where a record key was expected, or vice versa
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// An update tried to re-key a record. Indicates a caller bug.
    #[error("Record key mismatch: loaded '{expected}', update carries '{actual}'")]
    RecordKeyMismatch { expected: String, actual: String },

    /// Export marker bookkeeping violated its 0-or-1 invariant
    #[error("Export marker error: {0}")]
    ExportMarker(String),

    /// Advisory lock errors (not "lock busy", which is a normal outcome)
    #[error("Lock error: {0}")]
    Lock(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl SplitStoreError {
    /// Returns `true` for errors that indicate a programming error in the
    /// caller rather than bad data or an unavailable store.
    pub fn is_fault(&self) -> bool {
        matches!(self, SplitStoreError::RecordKeyMismatch { .. })
    }

    /// Returns `true` for lookups that matched zero or several rows.
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            SplitStoreError::RecordNotFound { .. } | SplitStoreError::AmbiguousRecord { .. }
        )
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for SplitStoreError {
    fn from(err: std::io::Error) -> Self {
        SplitStoreError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for SplitStoreError {
    fn from(err: serde_json::Error) -> Self {
        SplitStoreError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for SplitStoreError {
    fn from(err: toml::de::Error) -> Self {
        SplitStoreError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<tokio_postgres::Error> for SplitStoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        SplitStoreError::Database(err.to_string())
    }
}
