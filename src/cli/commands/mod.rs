//! CLI command implementations
//!
//! This module contains all CLI command implementations and the setup they
//! share: loading configuration, building stores and mapping errors to exit
//! codes.
//!
//! Exit codes: 0 success, 2 configuration, 3 lookup, 4 connection, 5 fatal.

pub mod demo;
pub mod edit;
pub mod history;
pub mod init;
pub mod pending;
pub mod show;
pub mod validate;

use crate::adapters::database::{create_split_stores, SplitStores};
use crate::config::{load_config, SplitStoreConfig};
use crate::core::updater::{SplitRecordEditor, Updater};
use crate::domain::{Projection, RecordLookup, SplitStoreError};
use clap::ValueEnum;
use serde_json::Value;
use std::path::Path;

/// Which store a command reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProjectionArg {
    Identifying,
    Deidentified,
}

impl From<ProjectionArg> for Projection {
    fn from(arg: ProjectionArg) -> Self {
        match arg {
            ProjectionArg::Identifying => Projection::Identifying,
            ProjectionArg::Deidentified => Projection::Deidentified,
        }
    }
}

/// Exit code for a failed operation
pub fn exit_code(error: &SplitStoreError) -> i32 {
    match error {
        SplitStoreError::Configuration(_) => 2,
        SplitStoreError::RecordNotFound { .. }
        | SplitStoreError::AmbiguousRecord { .. }
        | SplitStoreError::InvalidKeyFormat(_) => 3,
        SplitStoreError::Database(_) => 4,
        _ => 5,
    }
}

/// Prints an operation failure and returns its exit code
pub(crate) fn report(action: &str, error: &SplitStoreError) -> i32 {
    tracing::error!(error = %error, "{action} failed");
    println!("❌ {action} failed");
    println!("   Error: {error}");
    exit_code(error)
}

/// Configuration plus the two stores, as every store-backed command needs
pub(crate) struct CommandContext {
    pub config: SplitStoreConfig,
    pub stores: SplitStores,
}

impl CommandContext {
    /// Loads configuration and builds the stores
    ///
    /// On failure the problem is printed and the exit code returned.
    pub fn open(config_path: &Path) -> Result<Self, i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Err(2);
            }
        };

        let stores = match create_split_stores(&config) {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to set up database connections");
                println!("   Error: {e}");
                return Err(exit_code(&e));
            }
        };

        Ok(Self { config, stores })
    }

    pub fn dry_run(&self) -> bool {
        self.config.application.dry_run
    }

    /// Updater over one projection, untyped content
    pub fn updater(&self, projection: Projection) -> crate::domain::Result<Updater<Value>> {
        updater_for(&self.stores, &self.config, projection)
    }

    /// Editor over both projections of `stores`
    pub fn editor_on(
        &self,
        stores: &SplitStores,
    ) -> crate::domain::Result<SplitRecordEditor<Value, Value>> {
        SplitRecordEditor::new(
            updater_for(stores, &self.config, Projection::Identifying)?,
            updater_for(stores, &self.config, Projection::Deidentified)?,
        )
    }

    /// Stores an edit of `lookup` should be applied to
    ///
    /// In dry-run mode this is an in-memory copy of the record; the real
    /// stores are only read.
    pub async fn edit_target(&self, lookup: &RecordLookup) -> crate::domain::Result<SplitStores> {
        if !self.dry_run() {
            return Ok(self.stores.clone());
        }
        let record = self.editor_on(&self.stores)?.load(lookup).await?;
        self.stores
            .copy_into_memory(&self.config.records, &record.deidentified.record_key)
            .await
    }
}

fn updater_for(
    stores: &SplitStores,
    config: &SplitStoreConfig,
    projection: Projection,
) -> crate::domain::Result<Updater<Value>> {
    match projection {
        Projection::Identifying => Ok(Updater::identifying(
            stores.identifying.clone(),
            config.records.identifying_tables()?,
        )),
        Projection::Deidentified => Updater::deidentified(
            stores.deidentified.clone(),
            config.records.deidentified_tables()?,
        ),
    }
}

/// Parses a lookup argument, printing the problem on failure
pub(crate) fn parse_lookup(raw: &str) -> Result<RecordLookup, i32> {
    raw.parse().map_err(|e: SplitStoreError| {
        println!("❌ Invalid record key or row id: {raw}");
        println!("   Error: {e}");
        exit_code(&e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(SplitStoreError::Configuration("x".into()), 2 ; "configuration")]
    #[test_case(SplitStoreError::RecordNotFound { label: "non-PII".into(), key: "k".into() }, 3 ; "not found")]
    #[test_case(SplitStoreError::AmbiguousRecord { label: "PII".into(), key: "k".into(), count: 2 }, 3 ; "ambiguous")]
    #[test_case(SplitStoreError::Database("refused".into()), 4 ; "database")]
    #[test_case(SplitStoreError::RecordKeyMismatch { expected: "a".into(), actual: "b".into() }, 5 ; "fault")]
    fn test_exit_code(error: SplitStoreError, expected: i32) {
        assert_eq!(exit_code(&error), expected);
    }

    #[test]
    fn test_projection_arg_conversion() {
        assert_eq!(
            Projection::from(ProjectionArg::Identifying),
            Projection::Identifying
        );
        assert_eq!(
            Projection::from(ProjectionArg::Deidentified),
            Projection::Deidentified
        );
    }

    #[test]
    fn test_open_missing_config_is_configuration_error() {
        let code = CommandContext::open(Path::new("/nonexistent/splitstore.toml"))
            .err()
            .unwrap();
        assert_eq!(code, 2);
    }
}
