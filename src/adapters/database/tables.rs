//! Table naming for one record type
//!
//! Table names end up interpolated into SQL text (identifiers can't be bound
//! as parameters), so every name is validated here before any adapter sees it.

use crate::domain::{Result, SplitStoreError};
use regex::Regex;
use std::sync::OnceLock;

/// Longest accepted identifier. Leaves room for index-name suffixes within
/// PostgreSQL's 63 byte limit.
const MAX_IDENTIFIER_LEN: usize = 48;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("static regex is valid"))
}

/// Validates a SQL identifier used as (part of) a table name
///
/// # Errors
///
/// Returns a `Validation` error for anything but lowercase ASCII letters,
/// digits and underscores, or names longer than 48 characters.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(SplitStoreError::Validation(format!(
            "identifier '{name}' is longer than {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    if !identifier_pattern().is_match(name) {
        return Err(SplitStoreError::Validation(format!(
            "identifier '{name}' must match [a-z_][a-z0-9_]*"
        )));
    }
    Ok(())
}

/// Current, backup and (optionally) export-marker tables of one record type
/// in one store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTables {
    current: String,
    backup: String,
    export_marker: Option<String>,
}

impl RecordTables {
    /// Tables `{prefix}_current_{record_type}` and `{prefix}_backup_{record_type}`
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if a resulting name is not a safe identifier.
    pub fn new(prefix: &str, record_type: &str) -> Result<Self> {
        validate_identifier(prefix)?;
        validate_identifier(record_type)?;
        let current = format!("{prefix}_current_{record_type}");
        let backup = format!("{prefix}_backup_{record_type}");
        validate_identifier(&current)?;
        validate_identifier(&backup)?;
        Ok(Self {
            current,
            backup,
            export_marker: None,
        })
    }

    /// Adds the export-marker table (de-identified store only)
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the name is not a safe identifier or
    /// collides with the record tables.
    pub fn with_export_marker(mut self, table: &str) -> Result<Self> {
        validate_identifier(table)?;
        if table == self.current || table == self.backup {
            return Err(SplitStoreError::Validation(format!(
                "export marker table '{table}' collides with a record table"
            )));
        }
        self.export_marker = Some(table.to_string());
        Ok(self)
    }

    /// Name of the current table
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Name of the backup table
    pub fn backup(&self) -> &str {
        &self.backup
    }

    /// Name of the export-marker table, if configured
    pub fn export_marker(&self) -> Option<&str> {
        self.export_marker.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_table_names() {
        let tables = RecordTables::new("fever", "surveys").unwrap();
        assert_eq!(tables.current(), "fever_current_surveys");
        assert_eq!(tables.backup(), "fever_backup_surveys");
        assert_eq!(tables.export_marker(), None);
    }

    #[test]
    fn test_with_export_marker() {
        let tables = RecordTables::new("fever", "surveys")
            .unwrap()
            .with_export_marker("fever_export_markers")
            .unwrap();
        assert_eq!(tables.export_marker(), Some("fever_export_markers"));
    }

    #[test]
    fn test_export_marker_collision() {
        let result = RecordTables::new("fever", "surveys")
            .unwrap()
            .with_export_marker("fever_current_surveys");
        assert!(result.is_err());
    }

    #[test_case("surveys; DROP TABLE x" ; "injection")]
    #[test_case("Surveys" ; "uppercase")]
    #[test_case("9surveys" ; "leading digit")]
    #[test_case("" ; "empty")]
    fn test_rejects_unsafe_identifiers(record_type: &str) {
        assert!(RecordTables::new("fever", record_type).is_err());
    }

    #[test]
    fn test_rejects_long_identifier() {
        let long = "x".repeat(MAX_IDENTIFIER_LEN);
        assert!(RecordTables::new("fever", &long).is_err());
    }
}
