//! Record identifier types with validation
//!
//! Keys coming from users and jobs are parsed once, here, into typed values.
//! Core logic receives a [`RecordKey`], a [`RowId`] or a [`RecordLookup`] and
//! never has to guess which kind of key a string is.

use super::errors::SplitStoreError;
use super::result::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of record-key characters shown in log lines.
const SHORT_KEY_LEN: usize = 8;

fn is_row_id_text(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Client-generated correlation key (csruid)
///
/// Stable for the lifetime of a record and identical in the identifying and
/// de-identified stores. A record key is never purely numeric, so it can't be
/// confused with a [`RowId`].
///
/// # Examples
///
/// ```
/// use splitstore::domain::ids::RecordKey;
///
/// let key = RecordKey::new("f3a1c0de9b7e4d2a").unwrap();
/// assert_eq!(key.short(), "f3a1c0de..");
/// assert!(RecordKey::new("12345").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordKey(String);

impl RecordKey {
    /// Creates a new RecordKey
    ///
    /// # Errors
    ///
    /// Returns `InvalidKeyFormat` if the key is empty or looks like a row id.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(SplitStoreError::InvalidKeyFormat(
                "record key cannot be empty".to_string(),
            ));
        }
        if is_row_id_text(&key) {
            return Err(SplitStoreError::InvalidKeyFormat(format!(
                "expected non-numeric record key, got '{key}'"
            )));
        }
        Ok(Self(key))
    }

    /// Returns the record key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Truncated form for log lines
    pub fn short(&self) -> String {
        short_text(&self.0)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordKey {
    type Err = SplitStoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for RecordKey {
    type Error = SplitStoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RecordKey> for String {
    fn from(key: RecordKey) -> Self {
        key.0
    }
}

impl AsRef<str> for RecordKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Store-local row identifier
///
/// Auto-assigned by the store and immutable. Only meaningful within the
/// store (and table) that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(i64);

impl RowId {
    /// Wraps a raw row id
    ///
    /// # Errors
    ///
    /// Returns `InvalidKeyFormat` for ids below 1.
    pub fn new(id: i64) -> Result<Self> {
        if id < 1 {
            return Err(SplitStoreError::InvalidKeyFormat(format!(
                "row id must be positive, got {id}"
            )));
        }
        Ok(Self(id))
    }

    /// Returns the raw value
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RowId {
    type Err = SplitStoreError;

    fn from_str(s: &str) -> Result<Self> {
        if !is_row_id_text(s) {
            return Err(SplitStoreError::InvalidKeyFormat(format!(
                "expected numeric row id, got '{s}'"
            )));
        }
        let id: i64 = s.parse().map_err(|_| {
            SplitStoreError::InvalidKeyFormat(format!("row id out of range: '{s}'"))
        })?;
        Self::new(id)
    }
}

/// How to find one current row
///
/// Decided once at the API edge: all-digit input is a row id, anything else
/// is a record-key prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordLookup {
    /// Exact store-local row id
    RowId(RowId),
    /// Leading characters of a record key
    KeyPrefix(String),
}

impl RecordLookup {
    /// Lookup by the complete record key (still matched as a prefix)
    pub fn key(key: &RecordKey) -> Self {
        RecordLookup::KeyPrefix(key.as_str().to_string())
    }

    /// Log-safe description of the lookup
    pub fn describe(&self) -> String {
        match self {
            RecordLookup::RowId(id) => format!("row {id}"),
            RecordLookup::KeyPrefix(prefix) => format!("key '{}'", short_text(prefix)),
        }
    }
}

impl FromStr for RecordLookup {
    type Err = SplitStoreError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SplitStoreError::InvalidKeyFormat(
                "lookup key cannot be empty".to_string(),
            ));
        }
        if is_row_id_text(s) {
            Ok(RecordLookup::RowId(s.parse()?))
        } else {
            Ok(RecordLookup::KeyPrefix(s.to_string()))
        }
    }
}

impl fmt::Display for RecordLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordLookup::RowId(id) => write!(f, "{id}"),
            RecordLookup::KeyPrefix(prefix) => write!(f, "{prefix}"),
        }
    }
}

fn short_text(s: &str) -> String {
    match s.char_indices().nth(SHORT_KEY_LEN) {
        Some((idx, _)) => format!("{}..", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_record_key_valid() {
        let key = RecordKey::new("3b9d7e1c-csruid").unwrap();
        assert_eq!(key.as_str(), "3b9d7e1c-csruid");
        assert_eq!(key.to_string(), "3b9d7e1c-csruid");
    }

    #[test_case("" ; "empty")]
    #[test_case("   " ; "whitespace")]
    #[test_case("42" ; "numeric")]
    fn test_record_key_rejected(input: &str) {
        let err = RecordKey::new(input).unwrap_err();
        assert!(matches!(err, SplitStoreError::InvalidKeyFormat(_)));
    }

    #[test]
    fn test_record_key_short() {
        let key = RecordKey::new("abcdefghijklmnop").unwrap();
        assert_eq!(key.short(), "abcdefgh..");

        let key = RecordKey::new("abc").unwrap();
        assert_eq!(key.short(), "abc");
    }

    #[test]
    fn test_record_key_serde_validates() {
        let key: RecordKey = serde_json::from_str("\"abc-1\"").unwrap();
        assert_eq!(key.as_str(), "abc-1");
        assert!(serde_json::from_str::<RecordKey>("\"123\"").is_err());
    }

    #[test_case("17", Some(17) ; "plain")]
    #[test_case("0", None ; "zero")]
    #[test_case("abc", None ; "letters")]
    #[test_case("-4", None ; "negative")]
    #[test_case("99999999999999999999", None ; "overflow")]
    fn test_row_id_parse(input: &str, expected: Option<i64>) {
        let parsed = input.parse::<RowId>().ok().map(RowId::get);
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_lookup_parse() {
        assert_eq!(
            "123".parse::<RecordLookup>().unwrap(),
            RecordLookup::RowId(RowId::new(123).unwrap())
        );
        assert_eq!(
            "ab12".parse::<RecordLookup>().unwrap(),
            RecordLookup::KeyPrefix("ab12".to_string())
        );
        assert!("".parse::<RecordLookup>().is_err());
    }

    #[test]
    fn test_lookup_describe_truncates() {
        let lookup = RecordLookup::KeyPrefix("0123456789abcdef-x".to_string());
        assert_eq!(lookup.describe(), "key '01234567..'");
    }
}
