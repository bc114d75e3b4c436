//! Store factory
//!
//! This module builds the pair of stores a split deployment runs on from
//! configuration.

use crate::adapters::database::tables::RecordTables;
use crate::adapters::database::traits::{finish, RecordStore, StoreTransaction, StoredRow};
use crate::adapters::memory::MemoryStore;
use crate::adapters::postgresql::{PostgreSQLClient, PostgreSQLStore};
use crate::config::schema::{RecordsConfig, SplitStoreConfig};
use crate::domain::{RecordKey, Result};
use std::sync::Arc;

/// The identifying and de-identified stores of one deployment
#[derive(Clone)]
pub struct SplitStores {
    pub identifying: Arc<dyn RecordStore>,
    pub deidentified: Arc<dyn RecordStore>,
}

/// Create both PostgreSQL-backed stores from the configuration
///
/// Each store gets its own connection pool. No connection is opened yet.
///
/// # Errors
///
/// Returns a `Configuration` error if a connection string can't be parsed.
pub fn create_split_stores(config: &SplitStoreConfig) -> Result<SplitStores> {
    tracing::info!("Creating PostgreSQL stores");
    let identifying = PostgreSQLClient::new(config.identifying.clone())?;
    let deidentified = PostgreSQLClient::new(config.deidentified.clone())?;

    Ok(SplitStores {
        identifying: Arc::new(PostgreSQLStore::new(identifying)),
        deidentified: Arc::new(PostgreSQLStore::new(deidentified)),
    })
}

impl SplitStores {
    /// Two empty in-memory stores
    pub fn in_memory() -> Self {
        Self {
            identifying: Arc::new(MemoryStore::new()),
            deidentified: Arc::new(MemoryStore::new()),
        }
    }

    /// Checks that both stores are reachable
    pub async fn test_connections(&self) -> Result<()> {
        self.identifying.test_connection().await?;
        self.deidentified.test_connection().await
    }

    /// Creates the record tables in both stores
    pub async fn ensure_tables(&self, records: &RecordsConfig) -> Result<()> {
        self.identifying
            .ensure_tables(&records.identifying_tables()?)
            .await?;
        self.deidentified
            .ensure_tables(&records.deidentified_tables()?)
            .await
    }

    /// Copies every row of `record_key` into fresh in-memory stores
    ///
    /// Current rows, backup rows and the export marker are carried over, so
    /// an edit against the copy behaves exactly like one against the real
    /// stores without touching them.
    pub async fn copy_into_memory(
        &self,
        records: &RecordsConfig,
        record_key: &RecordKey,
    ) -> Result<SplitStores> {
        let identifying =
            copy_record(&*self.identifying, &records.identifying_tables()?, record_key).await?;
        let deidentified =
            copy_record(&*self.deidentified, &records.deidentified_tables()?, record_key).await?;

        tracing::debug!(
            record_key = %record_key.short(),
            "Record copied into memory for dry run"
        );
        Ok(SplitStores {
            identifying: Arc::new(identifying),
            deidentified: Arc::new(deidentified),
        })
    }
}

struct RecordCopy {
    current: Vec<StoredRow>,
    backups: Vec<StoredRow>,
    exported: Vec<i64>,
}

async fn copy_record(
    source: &dyn RecordStore,
    tables: &RecordTables,
    record_key: &RecordKey,
) -> Result<MemoryStore> {
    let mut tx = source.begin().await?;
    let outcome = read_record(&mut *tx, tables, record_key).await;
    let copy = finish(tx, outcome).await?;

    let memory = MemoryStore::new();
    memory.ensure_tables(tables).await?;
    for row in copy.current {
        memory.seed(tables.current(), row)?;
    }
    for row in copy.backups {
        memory.seed(tables.backup(), row)?;
    }

    if let Some(marker) = tables.export_marker() {
        let mut tx = memory.begin().await?;
        let mut outcome = Ok(());
        for id in copy.exported {
            if let Err(e) = tx.insert_marker(marker, id).await {
                outcome = Err(e);
                break;
            }
        }
        finish(tx, outcome).await?;
    }
    Ok(memory)
}

async fn read_record(
    tx: &mut dyn StoreTransaction,
    tables: &RecordTables,
    record_key: &RecordKey,
) -> Result<RecordCopy> {
    let current = tx.select_by_key(tables.current(), record_key.as_str()).await?;
    let backups = tx.select_by_key(tables.backup(), record_key.as_str()).await?;

    let mut exported = Vec::new();
    if let Some(marker) = tables.export_marker() {
        for row in &current {
            if tx.marker_exported_at(marker, row.id).await?.is_some() {
                exported.push(row.id);
            }
        }
    }

    Ok(RecordCopy {
        current,
        backups,
        exported,
    })
}
