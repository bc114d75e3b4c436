//! Staged writes of a memory transaction
//!
//! Every write is recorded as a [`Change`] and applied to the transaction's
//! private copy right away. On commit the log is replayed against the shared
//! state; on rollback it is simply dropped.

use crate::adapters::database::traits::StoredRow;
use crate::domain::{Result, SplitStoreError};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

/// One table of a memory store
#[derive(Debug, Clone)]
pub(crate) enum MemoryTable {
    /// A current or backup table
    Records {
        unique_key: bool,
        rows: BTreeMap<i64, StoredRow>,
    },
    /// An export-marker table referencing a current table by row id
    Markers {
        references: String,
        markers: BTreeMap<i64, DateTime<Utc>>,
    },
}

/// All tables of a memory store
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryState {
    pub(crate) tables: HashMap<String, MemoryTable>,
}

/// A write staged inside a transaction
#[derive(Debug, Clone)]
pub(crate) enum Change {
    Insert {
        table: String,
        row: StoredRow,
    },
    Upsert {
        table: String,
        row: StoredRow,
    },
    DeleteByKey {
        table: String,
        record_key: String,
    },
    InsertMarker {
        table: String,
        record_id: i64,
        exported_at: DateTime<Utc>,
    },
    DeleteMarker {
        table: String,
        record_id: i64,
    },
}

/// Outcome of applying one change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Applied {
    /// Id of the inserted or updated row
    Row(i64),
    /// Number of rows affected
    Count(u64),
}

impl MemoryState {
    fn missing(table: &str) -> SplitStoreError {
        SplitStoreError::Database(format!("relation \"{table}\" does not exist"))
    }

    pub(crate) fn records(&self, table: &str) -> Result<&BTreeMap<i64, StoredRow>> {
        match self.tables.get(table) {
            Some(MemoryTable::Records { rows, .. }) => Ok(rows),
            Some(MemoryTable::Markers { .. }) => Err(SplitStoreError::Database(format!(
                "\"{table}\" is not a record table"
            ))),
            None => Err(Self::missing(table)),
        }
    }

    pub(crate) fn markers(&self, table: &str) -> Result<&BTreeMap<i64, DateTime<Utc>>> {
        match self.tables.get(table) {
            Some(MemoryTable::Markers { markers, .. }) => Ok(markers),
            Some(MemoryTable::Records { .. }) => Err(SplitStoreError::Database(format!(
                "\"{table}\" is not a marker table"
            ))),
            None => Err(Self::missing(table)),
        }
    }

    /// Applies a change, enforcing the same constraints as the SQL schema
    pub(crate) fn apply(&mut self, change: &Change) -> Result<Applied> {
        match change {
            Change::Insert { table, row } => {
                let (unique_key, rows) = self.records_mut(table)?;
                if unique_key && rows.values().any(|r| r.record_key == row.record_key) {
                    return Err(SplitStoreError::Database(format!(
                        "duplicate key value violates unique constraint on \"{table}\".csruid"
                    )));
                }
                rows.insert(row.id, row.clone());
                Ok(Applied::Row(row.id))
            }
            Change::Upsert { table, row } => {
                let (_, rows) = self.records_mut(table)?;
                let existing = rows
                    .values()
                    .find(|r| r.record_key == row.record_key)
                    .map(|r| r.id);
                match existing {
                    Some(id) => {
                        if let Some(current) = rows.get_mut(&id) {
                            current.device = row.device.clone();
                            current.content = row.content.clone();
                        }
                        Ok(Applied::Row(id))
                    }
                    None => {
                        rows.insert(row.id, row.clone());
                        Ok(Applied::Row(row.id))
                    }
                }
            }
            Change::DeleteByKey { table, record_key } => {
                let doomed: Vec<i64> = self
                    .records(table)?
                    .values()
                    .filter(|r| &r.record_key == record_key)
                    .map(|r| r.id)
                    .collect();
                self.check_not_referenced(table, &doomed)?;
                let (_, rows) = self.records_mut(table)?;
                for id in &doomed {
                    rows.remove(id);
                }
                Ok(Applied::Count(doomed.len() as u64))
            }
            Change::InsertMarker {
                table,
                record_id,
                exported_at,
            } => {
                let references = match self.tables.get(table) {
                    Some(MemoryTable::Markers { references, .. }) => references.clone(),
                    _ => return Err(Self::missing(table)),
                };
                if !self.records(&references)?.contains_key(record_id) {
                    return Err(SplitStoreError::Database(format!(
                        "insert on \"{table}\" violates foreign key: row {record_id} not in \"{references}\""
                    )));
                }
                let markers = self.markers_mut(table)?;
                if markers.contains_key(record_id) {
                    return Ok(Applied::Count(0));
                }
                markers.insert(*record_id, *exported_at);
                Ok(Applied::Count(1))
            }
            Change::DeleteMarker { table, record_id } => {
                let removed = self.markers_mut(table)?.remove(record_id);
                Ok(Applied::Count(u64::from(removed.is_some())))
            }
        }
    }

    fn records_mut(&mut self, table: &str) -> Result<(bool, &mut BTreeMap<i64, StoredRow>)> {
        match self.tables.get_mut(table) {
            Some(MemoryTable::Records { unique_key, rows }) => Ok((*unique_key, rows)),
            _ => Err(Self::missing(table)),
        }
    }

    fn markers_mut(&mut self, table: &str) -> Result<&mut BTreeMap<i64, DateTime<Utc>>> {
        match self.tables.get_mut(table) {
            Some(MemoryTable::Markers { markers, .. }) => Ok(markers),
            _ => Err(Self::missing(table)),
        }
    }

    fn check_not_referenced(&self, table: &str, ids: &[i64]) -> Result<()> {
        for (name, t) in &self.tables {
            if let MemoryTable::Markers {
                references,
                markers,
            } = t
            {
                if references == table && ids.iter().any(|id| markers.contains_key(id)) {
                    return Err(SplitStoreError::Database(format!(
                        "delete on \"{table}\" violates foreign key on \"{name}\""
                    )));
                }
            }
        }
        Ok(())
    }
}
