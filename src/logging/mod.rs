//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Configurable log levels, overridable through `RUST_LOG`
//! - Local JSON file logging with rotation
//!
//! Record keys are never logged in full; use [`crate::domain::RecordKey::short`].
//!
//! # Example
//!
//! ```no_run
//! use splitstore::logging::init_logging;
//! use splitstore::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the outcome of an updater edit
///
/// # Example
///
/// ```
/// use splitstore::log_record_edit;
/// use splitstore::domain::{Projection, RecordKey};
///
/// let key = RecordKey::new("a9c2f0e1-77b4").unwrap();
/// log_record_edit!(Projection::Deidentified, &key, true);
/// ```
#[macro_export]
macro_rules! log_record_edit {
    ($projection:expr, $record_key:expr, $changed:expr) => {
        if $changed {
            tracing::info!(
                projection = %$projection,
                record_key = %$record_key.short(),
                "Record updated, previous version backed up"
            );
        } else {
            tracing::info!(
                projection = %$projection,
                record_key = %$record_key.short(),
                "Record unchanged, nothing written"
            );
        }
    };
}

/// Log whether a scoped advisory lock was acquired
///
/// # Example
///
/// ```
/// use splitstore::log_lock_outcome;
/// use splitstore::core::lock::LockKey;
///
/// let key = LockKey::derive("export-job");
/// log_lock_outcome!("export-job", key, false);
/// ```
#[macro_export]
macro_rules! log_lock_outcome {
    ($scope:expr, $key:expr, $acquired:expr) => {
        if $acquired {
            tracing::debug!(scope = %$scope, lock_key = %$key, "Advisory lock acquired");
        } else {
            tracing::info!(
                scope = %$scope,
                lock_key = %$key,
                "Advisory lock held elsewhere, skipping"
            );
        }
    };
}
