//! In-process record store
//!
//! Each transaction works on a private copy of the store taken at `begin` and
//! logs its writes. Commit replays the log against the shared state under a
//! short lock, so a transaction's writes become visible all at once or not at
//! all. Row-id sequences are shared and not rolled back, as in PostgreSQL.
//!
//! Advisory locks are held per transaction and released when it ends, however
//! it ends.

use super::change::{Applied, Change, MemoryState, MemoryTable};
use crate::adapters::database::tables::RecordTables;
use crate::adapters::database::traits::{RecordStore, RowData, StoreTransaction, StoredRow};
use crate::core::lock::key::LockKey;
use crate::domain::{Result, SplitStoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

struct Shared {
    state: Mutex<MemoryState>,
    sequences: Mutex<HashMap<String, i64>>,
    held_locks: Mutex<HashSet<LockKey>>,
    lock_released: Notify,
}

fn guard<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| SplitStoreError::Database("memory store mutex poisoned".to_string()))
}

/// In-memory implementation of [`RecordStore`]
///
/// Clones share the same underlying tables and locks, which makes it easy to
/// hand one store to several updaters or lock managers.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(MemoryState::default()),
                sequences: Mutex::new(HashMap::new()),
                held_locks: Mutex::new(HashSet::new()),
                lock_released: Notify::new(),
            }),
        }
    }

    /// Insert a row with a known id, outside any transaction
    ///
    /// Used to stage a copy of rows read from another store.
    ///
    /// # Errors
    ///
    /// Returns a `Database` error if the table is missing or the row violates
    /// a constraint.
    pub fn seed(&self, table: &str, row: StoredRow) -> Result<()> {
        let id = row.id;
        guard(&self.shared.state)?.apply(&Change::Insert {
            table: table.to_string(),
            row,
        })?;
        let mut sequences = guard(&self.shared.sequences)?;
        let last = sequences.entry(table.to_string()).or_insert(0);
        *last = (*last).max(id);
        Ok(())
    }

    /// Number of advisory locks currently held by open transactions
    pub fn held_lock_count(&self) -> usize {
        guard(&self.shared.held_locks).map(|h| h.len()).unwrap_or(0)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn ensure_tables(&self, tables: &RecordTables) -> Result<()> {
        let mut state = guard(&self.shared.state)?;
        state
            .tables
            .entry(tables.current().to_string())
            .or_insert_with(|| MemoryTable::Records {
                unique_key: true,
                rows: BTreeMap::new(),
            });
        state
            .tables
            .entry(tables.backup().to_string())
            .or_insert_with(|| MemoryTable::Records {
                unique_key: false,
                rows: BTreeMap::new(),
            });
        if let Some(marker) = tables.export_marker() {
            state
                .tables
                .entry(marker.to_string())
                .or_insert_with(|| MemoryTable::Markers {
                    references: tables.current().to_string(),
                    markers: BTreeMap::new(),
                });
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let working = guard(&self.shared.state)?.clone();
        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.shared),
            working,
            log: Vec::new(),
            held: Vec::new(),
            finished: false,
        }))
    }
}

/// An open memory transaction
pub struct MemoryTransaction {
    shared: Arc<Shared>,
    working: MemoryState,
    log: Vec<Change>,
    held: Vec<LockKey>,
    finished: bool,
}

impl MemoryTransaction {
    fn next_id(&self, table: &str) -> Result<i64> {
        let mut sequences = guard(&self.shared.sequences)?;
        let last = sequences.entry(table.to_string()).or_insert(0);
        *last += 1;
        Ok(*last)
    }

    fn stage(&mut self, change: Change) -> Result<Applied> {
        let applied = self.working.apply(&change)?;
        self.log.push(change);
        Ok(applied)
    }

    fn stage_row(&mut self, change: Change) -> Result<i64> {
        match self.stage(change)? {
            Applied::Row(id) => Ok(id),
            Applied::Count(_) => Err(SplitStoreError::Database(
                "write did not return a row id".to_string(),
            )),
        }
    }

    fn stage_count(&mut self, change: Change) -> Result<u64> {
        match self.stage(change)? {
            Applied::Count(n) => Ok(n),
            Applied::Row(_) => Ok(1),
        }
    }

    fn stored(row: &RowData, id: i64) -> StoredRow {
        StoredRow {
            id,
            record_key: row.record_key.clone(),
            device: row.device.clone(),
            content: row.content.clone(),
        }
    }

    fn acquire(&mut self, key: LockKey) -> Result<bool> {
        if self.held.contains(&key) {
            return Ok(true);
        }
        let mut held = guard(&self.shared.held_locks)?;
        if !held.insert(key) {
            return Ok(false);
        }
        self.held.push(key);
        Ok(true)
    }

    fn release_locks(&mut self) {
        if self.held.is_empty() {
            return;
        }
        if let Ok(mut held) = self.shared.held_locks.lock() {
            for key in self.held.drain(..) {
                held.remove(&key);
            }
        }
        self.shared.lock_released.notify_waiters();
    }

    fn select(&self, table: &str, keep: impl Fn(&StoredRow) -> bool) -> Result<Vec<StoredRow>> {
        Ok(self
            .working
            .records(table)?
            .values()
            .filter(|r| keep(r))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn select_by_id(&mut self, table: &str, id: i64) -> Result<Vec<StoredRow>> {
        self.select(table, |r| r.id == id)
    }

    async fn select_by_key(&mut self, table: &str, record_key: &str) -> Result<Vec<StoredRow>> {
        self.select(table, |r| r.record_key == record_key)
    }

    async fn select_by_key_prefix(
        &mut self,
        table: &str,
        prefix: &str,
    ) -> Result<Vec<StoredRow>> {
        self.select(table, |r| r.record_key.starts_with(prefix))
    }

    async fn insert(&mut self, table: &str, row: &RowData) -> Result<i64> {
        self.working.records(table)?;
        let id = self.next_id(table)?;
        self.stage_row(Change::Insert {
            table: table.to_string(),
            row: Self::stored(row, id),
        })
    }

    async fn upsert_by_key(&mut self, table: &str, row: &RowData) -> Result<i64> {
        let existing = self
            .working
            .records(table)?
            .values()
            .find(|r| r.record_key == row.record_key)
            .map(|r| r.id);
        let id = match existing {
            Some(id) => id,
            None => self.next_id(table)?,
        };
        self.stage_row(Change::Upsert {
            table: table.to_string(),
            row: Self::stored(row, id),
        })
    }

    async fn delete_by_key(&mut self, table: &str, record_key: &str) -> Result<u64> {
        self.stage_count(Change::DeleteByKey {
            table: table.to_string(),
            record_key: record_key.to_string(),
        })
    }

    async fn insert_marker(&mut self, table: &str, record_id: i64) -> Result<bool> {
        let inserted = self.stage_count(Change::InsertMarker {
            table: table.to_string(),
            record_id,
            exported_at: Utc::now(),
        })?;
        Ok(inserted == 1)
    }

    async fn delete_marker(&mut self, table: &str, record_id: i64) -> Result<u64> {
        self.stage_count(Change::DeleteMarker {
            table: table.to_string(),
            record_id,
        })
    }

    async fn marker_exported_at(
        &mut self,
        table: &str,
        record_id: i64,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self.working.markers(table)?.get(&record_id).copied())
    }

    async fn select_unmarked(
        &mut self,
        current_table: &str,
        marker_table: &str,
        limit: i64,
    ) -> Result<Vec<StoredRow>> {
        let markers = self.working.markers(marker_table)?;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .working
            .records(current_table)?
            .values()
            .filter(|r| !markers.contains_key(&r.id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn try_advisory_xact_lock(&mut self, key: LockKey) -> Result<bool> {
        self.acquire(key)
    }

    async fn advisory_xact_lock(&mut self, key: LockKey) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        loop {
            let released = shared.lock_released.notified();
            tokio::pin!(released);
            released.as_mut().enable();
            if self.acquire(key)? {
                return Ok(());
            }
            released.await;
        }
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.finished = true;
        let mut state = guard(&self.shared.state)?;
        let mut next = state.clone();
        for change in &self.log {
            next.apply(change)?;
        }
        *state = next;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.finished && !self.log.is_empty() {
            tracing::warn!(
                staged_changes = self.log.len(),
                "Memory transaction dropped unfinished; discarding staged changes"
            );
        }
        self.release_locks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn tables() -> RecordTables {
        RecordTables::new("fever", "surveys")
            .unwrap()
            .with_export_marker("fever_export_markers")
            .unwrap()
    }

    fn data(key: &str, n: i64) -> RowData {
        RowData {
            record_key: key.to_string(),
            device: json!({"installation": "i-1"}),
            content: json!({"n": n}),
        }
    }

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.ensure_tables(&tables()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let store = store().await;
        let t = tables();

        let mut tx = store.begin().await.unwrap();
        let id = tx.insert(t.current(), &data("abc", 1)).await.unwrap();
        assert_eq!(id, 1);

        let mut other = store.begin().await.unwrap();
        assert!(other.select_by_id(t.current(), id).await.unwrap().is_empty());
        other.rollback().await.unwrap();

        tx.commit().await.unwrap();

        let mut reader = store.begin().await.unwrap();
        let rows = reader.select_by_key(t.current(), "abc").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, json!({"n": 1}));
        reader.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_rollback_and_drop_discard_writes() {
        let store = store().await;
        let t = tables();

        let mut tx = store.begin().await.unwrap();
        tx.insert(t.current(), &data("abc", 1)).await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert(t.current(), &data("def", 1)).await.unwrap();
        drop(tx);

        let mut reader = store.begin().await.unwrap();
        assert!(reader
            .select_by_key_prefix(t.current(), "")
            .await
            .unwrap()
            .is_empty());
        reader.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_sequences_are_not_rolled_back() {
        let store = store().await;
        let t = tables();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.insert(t.current(), &data("a", 1)).await.unwrap(), 1);
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.insert(t.current(), &data("a", 1)).await.unwrap(), 2);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_by_key_updates_in_place() {
        let store = store().await;
        let t = tables();

        let mut tx = store.begin().await.unwrap();
        let first = tx.upsert_by_key(t.current(), &data("abc", 1)).await.unwrap();
        let second = tx.upsert_by_key(t.current(), &data("abc", 2)).await.unwrap();
        assert_eq!(first, second);
        let rows = tx.select_by_key(t.current(), "abc").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, json!({"n": 2}));
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_unmarked_listing() {
        let store = store().await;
        let t = tables();
        let marker = t.export_marker().unwrap();

        let mut tx = store.begin().await.unwrap();
        let a = tx.insert(t.current(), &data("a", 1)).await.unwrap();
        tx.insert(t.current(), &data("b", 1)).await.unwrap();
        assert!(tx.insert_marker(marker, a).await.unwrap());
        assert!(!tx.insert_marker(marker, a).await.unwrap());
        assert!(tx.marker_exported_at(marker, a).await.unwrap().is_some());

        let pending = tx.select_unmarked(t.current(), marker, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].record_key, "b");
        assert!(tx
            .select_unmarked(t.current(), marker, 0)
            .await
            .unwrap()
            .is_empty());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_try_lock_excludes_other_transactions() {
        let store = store().await;
        let key = LockKey::derive("export-job");

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        assert!(first.try_advisory_xact_lock(key).await.unwrap());
        assert!(first.try_advisory_xact_lock(key).await.unwrap());
        assert!(!second.try_advisory_xact_lock(key).await.unwrap());
        assert_eq!(store.held_lock_count(), 1);

        first.commit().await.unwrap();
        assert_eq!(store.held_lock_count(), 0);
        assert!(second.try_advisory_xact_lock(key).await.unwrap());
        second.rollback().await.unwrap();
        assert_eq!(store.held_lock_count(), 0);
    }

    #[tokio::test]
    async fn test_blocking_lock_waits_for_release() {
        let store = store().await;
        let key = LockKey::derive("giftcard");

        let mut holder = store.begin().await.unwrap();
        holder.advisory_xact_lock(key).await.unwrap();

        let waiter_store = store.clone();
        let waiter = tokio::spawn(async move {
            let mut tx = waiter_store.begin().await.unwrap();
            tx.advisory_xact_lock(key).await.unwrap();
            tx.rollback().await.unwrap();
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        holder.rollback().await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.held_lock_count(), 0);
    }

    #[tokio::test]
    async fn test_seed_advances_sequence() {
        let store = store().await;
        let t = tables();
        store
            .seed(
                t.current(),
                StoredRow {
                    id: 40,
                    record_key: "seeded".to_string(),
                    device: json!({}),
                    content: json!({}),
                },
            )
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.insert(t.current(), &data("next", 1)).await.unwrap(), 41);
        tx.commit().await.unwrap();
    }
}
