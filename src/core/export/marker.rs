//! Export markers: the export job's side of invalidation
//!
//! A marker row says "this record was exported with its current content".
//! The export job creates markers; accepted edits of the de-identified
//! projection delete them (see [`crate::core::updater::Updater::update`]).
//! Records without a marker are pending export.

use crate::adapters::database::tables::RecordTables;
use crate::adapters::database::traits::{finish, RecordStore};
use crate::domain::{RecordKey, Result, RowId, SplitStoreError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// A current row that has not been exported since its last change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingRecord {
    /// Row id in the de-identified current table
    pub row_id: RowId,

    /// Correlation key
    pub record_key: RecordKey,
}

/// Export-marker bookkeeping on the de-identified store
#[derive(Clone)]
pub struct ExportMarkers {
    store: Arc<dyn RecordStore>,
    tables: RecordTables,
}

impl ExportMarkers {
    /// # Errors
    ///
    /// `Configuration` if `tables` has no export-marker table.
    pub fn new(store: Arc<dyn RecordStore>, tables: RecordTables) -> Result<Self> {
        if tables.export_marker().is_none() {
            return Err(SplitStoreError::Configuration(format!(
                "no export marker table configured for '{}'",
                tables.current()
            )));
        }
        Ok(Self { store, tables })
    }

    fn marker_table(&self) -> Result<&str> {
        self.tables.export_marker().ok_or_else(|| {
            SplitStoreError::Configuration("no export marker table configured".to_string())
        })
    }

    /// Records that `row_id` was exported with its current content
    ///
    /// Returns `false` if the record was already marked.
    ///
    /// # Errors
    ///
    /// A `Database` error if the row doesn't exist in the current table.
    pub async fn mark_exported(&self, row_id: RowId) -> Result<bool> {
        let marker = self.marker_table()?;
        let mut tx = self.store.begin().await?;
        let outcome = tx.insert_marker(marker, row_id.get()).await;
        let created = finish(tx, outcome).await?;

        tracing::debug!(row_id = row_id.get(), created, "Export marker written");
        Ok(created)
    }

    /// When the record was marked exported, or `None` if it is pending
    pub async fn exported_at(&self, row_id: RowId) -> Result<Option<DateTime<Utc>>> {
        let marker = self.marker_table()?;
        let mut tx = self.store.begin().await?;
        let outcome = tx.marker_exported_at(marker, row_id.get()).await;
        finish(tx, outcome).await
    }

    /// Up to `limit` records without a marker, oldest row first
    pub async fn pending(&self, limit: usize) -> Result<Vec<PendingRecord>> {
        let marker = self.marker_table()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut tx = self.store.begin().await?;
        let outcome = tx
            .select_unmarked(self.tables.current(), marker, limit)
            .await;
        let rows = finish(tx, outcome).await?;

        let pending = rows
            .into_iter()
            .map(|row| {
                Ok(PendingRecord {
                    row_id: RowId::new(row.id)?,
                    record_key: RecordKey::new(row.record_key)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(count = pending.len(), "Loaded records pending export");
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::core::updater::Updater;
    use crate::domain::RecordAttributes;
    use serde_json::{json, Value};

    fn tables() -> RecordTables {
        RecordTables::new("fever", "surveys")
            .unwrap()
            .with_export_marker("fever_export_markers")
            .unwrap()
    }

    #[test]
    fn test_requires_marker_table() {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let tables = RecordTables::new("fever", "surveys").unwrap();
        assert!(ExportMarkers::new(store, tables).is_err());
    }

    #[tokio::test]
    async fn test_mark_and_pending() {
        let memory = MemoryStore::new();
        memory.ensure_tables(&tables()).await.unwrap();
        let store: Arc<dyn RecordStore> = Arc::new(memory);

        let updater = Updater::<Value>::deidentified(Arc::clone(&store), tables()).unwrap();
        let ids = updater
            .ingest(&[
                RecordAttributes::new(RecordKey::new("a-1").unwrap(), json!({}), json!({})),
                RecordAttributes::new(RecordKey::new("b-2").unwrap(), json!({}), json!({})),
            ])
            .await
            .unwrap();

        let markers = ExportMarkers::new(store, tables()).unwrap();
        assert_eq!(markers.pending(10).await.unwrap().len(), 2);
        assert!(markers.exported_at(ids[0]).await.unwrap().is_none());

        assert!(markers.mark_exported(ids[0]).await.unwrap());
        assert!(!markers.mark_exported(ids[0]).await.unwrap());
        assert!(markers.exported_at(ids[0]).await.unwrap().is_some());

        let pending = markers.pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].record_key.as_str(), "b-2");
        assert_eq!(pending[0].row_id, ids[1]);
    }

    #[tokio::test]
    async fn test_mark_unknown_row_fails() {
        let memory = MemoryStore::new();
        memory.ensure_tables(&tables()).await.unwrap();
        let markers = ExportMarkers::new(Arc::new(memory), tables()).unwrap();

        let result = markers.mark_exported(RowId::new(99).unwrap()).await;
        assert!(matches!(result, Err(SplitStoreError::Database(_))));
    }
}
