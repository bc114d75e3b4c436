//! Database abstraction traits
//!
//! This module defines the traits that store adapters must implement to back
//! an updater, the export markers and the lock manager. A store hands out
//! explicit transaction values; every public operation of this crate opens
//! exactly one, finishes it with [`finish`], and never keeps a connection
//! across calls.

use crate::adapters::database::tables::RecordTables;
use crate::core::lock::key::LockKey;
use crate::domain::{BackupRow, CurrentRow, RecordKey, Result, RowId, SplitStoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A row as stored: raw JSON payloads, not yet typed
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    /// Store-local row id
    pub id: i64,

    /// Record key (csruid column)
    pub record_key: String,

    /// Device metadata (JSONB)
    pub device: Value,

    /// Projection content (JSONB)
    pub content: Value,
}

impl StoredRow {
    fn typed_parts<C, D>(&self) -> Result<(RowId, RecordKey, D, C)>
    where
        C: DeserializeOwned,
        D: DeserializeOwned,
    {
        let row_id = RowId::new(self.id)?;
        let record_key = RecordKey::new(self.record_key.clone())?;
        let device = serde_json::from_value(self.device.clone()).map_err(|e| {
            SplitStoreError::Serialization(format!("Failed to decode device of row {}: {e}", self.id))
        })?;
        let content = serde_json::from_value(self.content.clone()).map_err(|e| {
            SplitStoreError::Serialization(format!(
                "Failed to decode content of row {}: {e}",
                self.id
            ))
        })?;
        Ok((row_id, record_key, device, content))
    }

    /// Converts to a typed current row
    pub fn into_current<C, D>(self) -> Result<CurrentRow<C, D>>
    where
        C: DeserializeOwned,
        D: DeserializeOwned,
    {
        let (row_id, record_key, device, content) = self.typed_parts()?;
        Ok(CurrentRow {
            row_id,
            record_key,
            device,
            content,
        })
    }

    /// Converts to a typed backup row
    pub fn into_backup<C, D>(self) -> Result<BackupRow<C, D>>
    where
        C: DeserializeOwned,
        D: DeserializeOwned,
    {
        let (row_id, record_key, device, content) = self.typed_parts()?;
        Ok(BackupRow {
            row_id,
            record_key,
            device,
            content,
        })
    }
}

/// Values written by an insert or upsert
#[derive(Debug, Clone, PartialEq)]
pub struct RowData {
    /// Record key (csruid column)
    pub record_key: String,

    /// Device metadata (JSONB)
    pub device: Value,

    /// Projection content (JSONB)
    pub content: Value,
}

impl RowData {
    /// Serializes typed parts into row data
    ///
    /// # Errors
    ///
    /// Returns a `Serialization` error if either payload can't be encoded.
    pub fn from_parts<C: Serialize, D: Serialize>(
        record_key: &RecordKey,
        device: &D,
        content: &C,
    ) -> Result<Self> {
        Ok(Self {
            record_key: record_key.as_str().to_string(),
            device: serde_json::to_value(device)?,
            content: serde_json::to_value(content)?,
        })
    }
}

/// Record store trait
///
/// One instance per physical store (identifying or de-identified).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short name for log lines ("postgresql", "memory")
    fn name(&self) -> &str;

    /// Test the store connection
    ///
    /// # Errors
    ///
    /// Returns an error if the connection test fails.
    async fn test_connection(&self) -> Result<()>;

    /// Create the tables of one record type if they don't exist
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL fails.
    async fn ensure_tables(&self, tables: &RecordTables) -> Result<()>;

    /// Open a transaction
    ///
    /// The returned value must be finished with `commit` or `rollback`.
    /// Dropping it unfinished discards its writes.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection is available or BEGIN fails.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;
}

/// An open store transaction
///
/// Advisory locks taken through this value are released when it ends,
/// whichever way it ends.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Rows of `table` with the given id (zero or one)
    async fn select_by_id(&mut self, table: &str, id: i64) -> Result<Vec<StoredRow>>;

    /// Rows of `table` with exactly this record key, ordered by id
    async fn select_by_key(&mut self, table: &str, record_key: &str) -> Result<Vec<StoredRow>>;

    /// Rows of `table` whose record key starts with `prefix`, ordered by id
    async fn select_by_key_prefix(&mut self, table: &str, prefix: &str)
        -> Result<Vec<StoredRow>>;

    /// Insert one row, returning its new id
    async fn insert(&mut self, table: &str, row: &RowData) -> Result<i64>;

    /// Insert several rows, returning their ids in input order
    async fn insert_many(&mut self, table: &str, rows: &[RowData]) -> Result<Vec<i64>> {
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(self.insert(table, row).await?);
        }
        Ok(ids)
    }

    /// Insert or replace the row with the same record key, returning its id
    async fn upsert_by_key(&mut self, table: &str, row: &RowData) -> Result<i64>;

    /// Delete rows with exactly this record key, returning the count
    async fn delete_by_key(&mut self, table: &str, record_key: &str) -> Result<u64>;

    /// Create an export marker; `false` if one already existed
    async fn insert_marker(&mut self, table: &str, record_id: i64) -> Result<bool>;

    /// Delete the export marker of a record, returning the count
    async fn delete_marker(&mut self, table: &str, record_id: i64) -> Result<u64>;

    /// When the record was marked exported, if it is
    async fn marker_exported_at(
        &mut self,
        table: &str,
        record_id: i64,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Current rows without an export marker, ordered by id
    async fn select_unmarked(
        &mut self,
        current_table: &str,
        marker_table: &str,
        limit: i64,
    ) -> Result<Vec<StoredRow>>;

    /// Non-blocking transaction-scoped advisory lock
    async fn try_advisory_xact_lock(&mut self, key: LockKey) -> Result<bool>;

    /// Blocking transaction-scoped advisory lock
    async fn advisory_xact_lock(&mut self, key: LockKey) -> Result<()>;

    /// Commit and end the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Roll back and end the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Ends a transaction according to the outcome of the work done in it
///
/// Commits when `outcome` is `Ok`, rolls back when it is `Err`. A failed
/// rollback is logged; the original error is what the caller sees.
///
/// # Errors
///
/// Returns the work's error, or the commit error.
pub async fn finish<T>(tx: Box<dyn StoreTransaction>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(
                    error = %rollback_err,
                    original_error = %err,
                    "Rollback failed after error"
                );
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stored_row_into_current() {
        let row = StoredRow {
            id: 3,
            record_key: "abc-3".to_string(),
            device: json!({"installation": "i"}),
            content: json!({"isDemo": false}),
        };

        let current: CurrentRow<Value, Value> = row.into_current().unwrap();
        assert_eq!(current.row_id.get(), 3);
        assert_eq!(current.record_key.as_str(), "abc-3");
        assert_eq!(current.content, json!({"isDemo": false}));
    }

    #[test]
    fn test_stored_row_decode_failure() {
        let row = StoredRow {
            id: 3,
            record_key: "abc-3".to_string(),
            device: json!(null),
            content: json!("not a number"),
        };

        let result: Result<CurrentRow<i64, Value>> = row.into_current();
        assert!(matches!(result, Err(SplitStoreError::Serialization(_))));
    }

    #[test]
    fn test_row_data_from_parts() {
        let key = RecordKey::new("abc").unwrap();
        let data = RowData::from_parts(&key, &json!({"d": 1}), &json!({"c": 2})).unwrap();
        assert_eq!(data.record_key, "abc");
        assert_eq!(data.device, json!({"d": 1}));
        assert_eq!(data.content, json!({"c": 2}));
    }
}
