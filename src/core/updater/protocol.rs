//! Versioned edit protocol for one store
//!
//! An [`Updater`] owns the current/backup table pair of one record type in
//! one store. Every accepted edit writes the pre-image to the backup table,
//! invalidates the export marker (de-identified store only) and upserts the
//! current row, all in one transaction.

use crate::adapters::database::tables::RecordTables;
use crate::adapters::database::traits::{finish, RecordStore, RowData, StoreTransaction, StoredRow};
use crate::domain::{
    BackupRow, CurrentRow, DemoFlag, Projection, RecordAttributes, RecordKey, RecordLookup,
    Result, RowId, SplitStoreError,
};
use crate::log_record_edit;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// Payload types an updater can store
///
/// Blanket-implemented for anything serde can round-trip and compare.
pub trait Payload: Serialize + DeserializeOwned + PartialEq + Clone + Send + Sync {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + PartialEq + Clone + Send + Sync {}

/// Edit protocol over one store's record tables
///
/// `C` is the content type of this projection, `D` the device metadata type.
pub struct Updater<C, D = Value> {
    store: Arc<dyn RecordStore>,
    tables: RecordTables,
    projection: Projection,
    _payload: PhantomData<fn() -> (C, D)>,
}

impl<C, D> Clone for Updater<C, D> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            tables: self.tables.clone(),
            projection: self.projection,
            _payload: PhantomData,
        }
    }
}

impl<C: Payload, D: Payload> Updater<C, D> {
    /// Updater for the identifying (PII) store
    ///
    /// The identifying store has no export markers; an export-marker table in
    /// `tables` is ignored.
    pub fn identifying(store: Arc<dyn RecordStore>, tables: RecordTables) -> Self {
        Self {
            store,
            tables,
            projection: Projection::Identifying,
            _payload: PhantomData,
        }
    }

    /// Updater for the de-identified store
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `tables` has no export-marker table.
    pub fn deidentified(store: Arc<dyn RecordStore>, tables: RecordTables) -> Result<Self> {
        if tables.export_marker().is_none() {
            return Err(SplitStoreError::Configuration(format!(
                "de-identified updater for '{}' needs an export marker table",
                tables.current()
            )));
        }
        Ok(Self {
            store,
            tables,
            projection: Projection::Deidentified,
            _payload: PhantomData,
        })
    }

    /// Which projection this updater edits
    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Tables this updater works on
    pub fn tables(&self) -> &RecordTables {
        &self.tables
    }

    fn label(&self) -> &'static str {
        self.projection.label()
    }

    fn marker_table(&self) -> Option<&str> {
        match self.projection {
            Projection::Deidentified => self.tables.export_marker(),
            Projection::Identifying => None,
        }
    }

    fn expect_one(&self, key: &str, mut rows: Vec<StoredRow>) -> Result<StoredRow> {
        match rows.len() {
            1 => Ok(rows.remove(0)),
            0 => Err(SplitStoreError::RecordNotFound {
                label: self.label().to_string(),
                key: key.to_string(),
            }),
            count => Err(SplitStoreError::AmbiguousRecord {
                label: self.label().to_string(),
                key: key.to_string(),
                count,
            }),
        }
    }

    async fn find_current(
        &self,
        tx: &mut dyn StoreTransaction,
        lookup: &RecordLookup,
    ) -> Result<StoredRow> {
        let rows = match lookup {
            RecordLookup::RowId(id) => tx.select_by_id(self.tables.current(), id.get()).await?,
            RecordLookup::KeyPrefix(prefix) => {
                tx.select_by_key_prefix(self.tables.current(), prefix).await?
            }
        };
        self.expect_one(&lookup.to_string(), rows)
    }

    /// Loads the current row matching `lookup`
    ///
    /// # Errors
    ///
    /// `RecordNotFound` or `AmbiguousRecord` unless exactly one row matches.
    pub async fn load(&self, lookup: &RecordLookup) -> Result<CurrentRow<C, D>> {
        tracing::info!(
            projection = %self.projection,
            lookup = %lookup.describe(),
            "Loading {} row",
            self.label()
        );
        let mut tx = self.store.begin().await?;
        let outcome = self.find_current(&mut *tx, lookup).await;
        finish(tx, outcome).await?.into_current()
    }

    /// Loads the current row with exactly this record key
    ///
    /// # Errors
    ///
    /// `RecordNotFound` if the record doesn't exist in this store.
    pub async fn load_by_key(&self, record_key: &RecordKey) -> Result<CurrentRow<C, D>> {
        tracing::debug!(
            projection = %self.projection,
            record_key = %record_key.short(),
            "Loading {} row by record key",
            self.label()
        );
        let mut tx = self.store.begin().await?;
        let outcome = tx
            .select_by_key(self.tables.current(), record_key.as_str())
            .await;
        let rows = finish(tx, outcome).await?;
        self.expect_one(record_key.as_str(), rows)?.into_current()
    }

    /// Loads one backup row by its id
    ///
    /// # Errors
    ///
    /// `RecordNotFound` if no backup row has this id.
    pub async fn load_backup(&self, row_id: RowId) -> Result<BackupRow<C, D>> {
        tracing::info!(
            projection = %self.projection,
            row_id = row_id.get(),
            "Loading {} backup row",
            self.label()
        );
        let mut tx = self.store.begin().await?;
        let outcome = tx.select_by_id(self.tables.backup(), row_id.get()).await;
        let rows = finish(tx, outcome).await?;
        self.expect_one(&row_id.to_string(), rows)?.into_backup()
    }

    /// All backup rows of a record, oldest edit first
    pub async fn load_backups(&self, record_key: &RecordKey) -> Result<Vec<BackupRow<C, D>>> {
        tracing::info!(
            projection = %self.projection,
            record_key = %record_key.short(),
            "Loading {} backup rows",
            self.label()
        );
        let mut tx = self.store.begin().await?;
        let outcome = tx
            .select_by_key(self.tables.backup(), record_key.as_str())
            .await;
        finish(tx, outcome)
            .await?
            .into_iter()
            .map(StoredRow::into_backup)
            .collect()
    }

    /// Replaces device and content of `current` with `proposed`
    ///
    /// Returns `false` without writing anything when nothing differs.
    /// Otherwise backs up the pre-image, drops the export marker
    /// (de-identified store) and writes the new values, atomically.
    ///
    /// # Errors
    ///
    /// `RecordKeyMismatch` if `proposed` carries another record key; store
    /// errors roll back every write of this call.
    pub async fn update(
        &self,
        current: &CurrentRow<C, D>,
        proposed: RecordAttributes<C, D>,
    ) -> Result<bool> {
        if proposed.record_key != current.record_key {
            return Err(SplitStoreError::RecordKeyMismatch {
                expected: current.record_key.to_string(),
                actual: proposed.record_key.to_string(),
            });
        }
        if proposed.device == current.device && proposed.content == current.content {
            log_record_edit!(self.projection, current.record_key, false);
            return Ok(false);
        }

        let pre_image = RowData::from_parts(&current.record_key, &current.device, &current.content)?;
        let post_image =
            RowData::from_parts(&proposed.record_key, &proposed.device, &proposed.content)?;

        let mut tx = self.store.begin().await?;
        let outcome = self
            .write_edit(&mut *tx, current.row_id, &pre_image, &post_image)
            .await;
        finish(tx, outcome).await?;

        log_record_edit!(self.projection, current.record_key, true);
        Ok(true)
    }

    async fn write_edit(
        &self,
        tx: &mut dyn StoreTransaction,
        row_id: RowId,
        pre_image: &RowData,
        post_image: &RowData,
    ) -> Result<()> {
        tracing::debug!(
            projection = %self.projection,
            row_id = row_id.get(),
            "Backing up {} row",
            self.label()
        );
        tx.insert(self.tables.backup(), pre_image).await?;

        if let Some(marker) = self.marker_table() {
            let deleted = tx.delete_marker(marker, row_id.get()).await?;
            expect_marker_count(deleted)?;
            if deleted == 1 {
                tracing::debug!(row_id = row_id.get(), "Export marker invalidated");
            }
        }

        let written = tx.upsert_by_key(self.tables.current(), post_image).await?;
        if written != row_id.get() {
            tracing::warn!(
                projection = %self.projection,
                loaded_row_id = row_id.get(),
                written_row_id = written,
                "Record was re-created since it was loaded"
            );
        }
        Ok(())
    }

    /// Replaces the content, keeping the device metadata
    pub async fn update_content(&self, current: &CurrentRow<C, D>, content: C) -> Result<bool> {
        let mut proposed = current.attributes();
        proposed.content = content;
        self.update(current, proposed).await
    }

    /// Replaces the device metadata, keeping the content
    pub async fn update_device(&self, current: &CurrentRow<C, D>, device: D) -> Result<bool> {
        let mut proposed = current.attributes();
        proposed.device = device;
        self.update(current, proposed).await
    }

    /// Sets the demo flag of the content
    pub async fn set_demo(&self, current: &CurrentRow<C, D>, is_demo: bool) -> Result<bool>
    where
        C: DemoFlag,
    {
        tracing::info!(
            projection = %self.projection,
            record_key = %current.record_key.short(),
            is_demo,
            "Setting demo flag"
        );
        let content = current.content.with_demo(is_demo)?;
        self.update_content(current, content).await
    }

    /// First write of new records, all or nothing
    ///
    /// # Errors
    ///
    /// Fails the whole batch if any record key already exists.
    pub async fn ingest(&self, records: &[RecordAttributes<C, D>]) -> Result<Vec<RowId>> {
        let rows = records
            .iter()
            .map(|r| RowData::from_parts(&r.record_key, &r.device, &r.content))
            .collect::<Result<Vec<_>>>()?;

        let mut tx = self.store.begin().await?;
        let outcome = tx.insert_many(self.tables.current(), &rows).await;
        let ids = finish(tx, outcome).await?;

        tracing::info!(
            projection = %self.projection,
            count = ids.len(),
            "Ingested {} rows",
            self.label()
        );
        ids.into_iter().map(RowId::new).collect()
    }

    /// Deletes the export marker of a record, so the export job picks it up
    /// again
    ///
    /// Returns `true` if a marker was deleted, `false` if there was none.
    ///
    /// # Errors
    ///
    /// `Validation` on the identifying updater, `RecordNotFound` if the record
    /// doesn't exist.
    pub async fn delete_export_marker(&self, record_key: &RecordKey) -> Result<bool> {
        let marker = self.marker_table().ok_or_else(|| {
            SplitStoreError::Validation(format!(
                "{} store has no export markers",
                self.label()
            ))
        })?;

        let mut tx = self.store.begin().await?;
        let outcome = self
            .delete_marker_for(&mut *tx, marker, record_key)
            .await;
        let deleted = finish(tx, outcome).await?;

        tracing::info!(
            record_key = %record_key.short(),
            deleted,
            "Export marker deletion requested"
        );
        Ok(deleted)
    }

    async fn delete_marker_for(
        &self,
        tx: &mut dyn StoreTransaction,
        marker: &str,
        record_key: &RecordKey,
    ) -> Result<bool> {
        let rows = tx
            .select_by_key(self.tables.current(), record_key.as_str())
            .await?;
        let row = self.expect_one(record_key.as_str(), rows)?;
        let deleted = tx.delete_marker(marker, row.id).await?;
        expect_marker_count(deleted)?;
        Ok(deleted == 1)
    }

    /// Removes every trace of the given records from this store
    ///
    /// Deletes export markers, backup rows and current rows. Meant for test
    /// fixtures and administrative cleanup only.
    pub async fn cleanup_for_testing(&self, record_keys: &[RecordKey]) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let outcome = self.delete_all(&mut *tx, record_keys).await;
        finish(tx, outcome).await?;

        tracing::warn!(
            projection = %self.projection,
            count = record_keys.len(),
            "Deleted records and their history"
        );
        Ok(())
    }

    async fn delete_all(
        &self,
        tx: &mut dyn StoreTransaction,
        record_keys: &[RecordKey],
    ) -> Result<()> {
        for key in record_keys {
            if let Some(marker) = self.marker_table() {
                for row in tx.select_by_key(self.tables.current(), key.as_str()).await? {
                    tx.delete_marker(marker, row.id).await?;
                }
            }
            tx.delete_by_key(self.tables.current(), key.as_str()).await?;
            tx.delete_by_key(self.tables.backup(), key.as_str()).await?;
        }
        Ok(())
    }
}

fn expect_marker_count(deleted: u64) -> Result<()> {
    if deleted > 1 {
        return Err(SplitStoreError::ExportMarker(format!(
            "Expected to delete 0 or 1 export markers, but deleted {deleted}"
        )));
    }
    Ok(())
}
