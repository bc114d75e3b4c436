//! Record model shared by both stores
//!
//! A logical document is split into two projections: the identifying one
//! (PII) and the de-identified one. Each store keeps a current row and an
//! append-only history of backup rows per record key; this module holds the
//! typed view of those rows.

use super::errors::SplitStoreError;
use super::ids::{RecordKey, RowId};
use super::result::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two stores a projection lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    /// Store holding personally identifying fields
    Identifying,
    /// Store holding everything else; source of exports
    Deidentified,
}

impl Projection {
    /// Short label used in log lines and error messages
    pub fn label(self) -> &'static str {
        match self {
            Projection::Identifying => "PII",
            Projection::Deidentified => "non-PII",
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::Identifying => write!(f, "identifying"),
            Projection::Deidentified => write!(f, "deidentified"),
        }
    }
}

/// The mutable part of a record: key plus both payloads
///
/// This is what callers propose to an updater, and what the external write
/// path ingests on first write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordAttributes<C, D> {
    /// Correlation key; an update must never change it
    pub record_key: RecordKey,

    /// Metadata about the device that submitted the document
    pub device: D,

    /// Store-specific partial projection of the document
    pub content: C,
}

impl<C, D> RecordAttributes<C, D> {
    /// Creates a new set of record attributes
    pub fn new(record_key: RecordKey, device: D, content: C) -> Self {
        Self {
            record_key,
            device,
            content,
        }
    }
}

/// Live row of one projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentRow<C, D> {
    /// Store-local id, stable across edits
    pub row_id: RowId,

    /// Correlation key
    pub record_key: RecordKey,

    /// Device metadata
    pub device: D,

    /// Projection content
    pub content: C,
}

impl<C: Clone, D: Clone> CurrentRow<C, D> {
    /// Attributes of this row, as a starting point for an edit
    pub fn attributes(&self) -> RecordAttributes<C, D> {
        RecordAttributes {
            record_key: self.record_key.clone(),
            device: self.device.clone(),
            content: self.content.clone(),
        }
    }
}

/// Pre-image of a current row, captured right before an accepted edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRow<C, D> {
    /// Id within the backup table (increases with each edit)
    pub row_id: RowId,

    /// Correlation key of the edited record
    pub record_key: RecordKey,

    /// Device metadata before the edit
    pub device: D,

    /// Content before the edit
    pub content: C,
}

/// Content types that carry a demo flag
///
/// Demo records are kept out of downstream reporting. Operators flip the flag
/// after the fact when a real device was used for a demonstration.
pub trait DemoFlag: Sized {
    /// Current value of the flag (absent means `false`)
    fn is_demo(&self) -> bool;

    /// Copy of the content with the flag set to `is_demo`
    ///
    /// # Errors
    ///
    /// `Validation` if the content has no place for the flag.
    fn with_demo(&self, is_demo: bool) -> Result<Self>;
}

impl DemoFlag for serde_json::Value {
    fn is_demo(&self) -> bool {
        self.get("isDemo")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    fn with_demo(&self, is_demo: bool) -> Result<Self> {
        let mut value = self.clone();
        match value {
            serde_json::Value::Object(ref mut map) => {
                map.insert("isDemo".to_string(), serde_json::Value::Bool(is_demo));
                Ok(value)
            }
            _ => Err(SplitStoreError::Validation(
                "content is not a JSON object, cannot set isDemo".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_projection_labels() {
        assert_eq!(Projection::Identifying.label(), "PII");
        assert_eq!(Projection::Deidentified.label(), "non-PII");
        assert_eq!(Projection::Deidentified.to_string(), "deidentified");
    }

    #[test]
    fn test_projection_serde() {
        let p: Projection = serde_json::from_str("\"identifying\"").unwrap();
        assert_eq!(p, Projection::Identifying);
    }

    #[test]
    fn test_json_demo_flag() {
        let content = json!({"responses": [], "isDemo": false});
        assert!(!content.is_demo());

        let flipped = content.with_demo(true).unwrap();
        assert!(flipped.is_demo());
        assert_eq!(flipped["responses"], json!([]));
    }

    #[test]
    fn test_json_demo_flag_absent() {
        let content = json!({"responses": []});
        assert!(!content.is_demo());
        assert!(content.with_demo(true).unwrap().is_demo());
    }

    #[test]
    fn test_json_demo_flag_rejects_non_object() {
        let result = json!(["fever"]).with_demo(true);
        assert!(matches!(result, Err(SplitStoreError::Validation(_))));
        assert!(json!(null).with_demo(false).is_err());
    }

    #[test]
    fn test_current_row_attributes() {
        let row = CurrentRow {
            row_id: RowId::new(7).unwrap(),
            record_key: RecordKey::new("key-7").unwrap(),
            device: json!({"installation": "i-1"}),
            content: json!({"isDemo": true}),
        };

        let attrs = row.attributes();
        assert_eq!(attrs.record_key, row.record_key);
        assert_eq!(attrs.content, row.content);
    }
}
