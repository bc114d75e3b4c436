//! PostgreSQL store implementing the database traits
//!
//! Transactions are driven with explicit `BEGIN`/`COMMIT` on a pooled
//! connection the transaction value owns outright. If the value is dropped
//! before it is finished, the connection is detached from the pool and closed,
//! and the server rolls the transaction back.

use crate::adapters::database::tables::RecordTables;
use crate::adapters::database::traits::{RecordStore, RowData, StoreTransaction, StoredRow};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::sql;
use crate::core::lock::key::LockKey;
use crate::domain::{Result, SplitStoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Object;
use std::sync::Arc;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

/// PostgreSQL implementation of [`RecordStore`]
pub struct PostgreSQLStore {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLStore {
    /// Create a new PostgreSQL store
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

#[async_trait]
impl RecordStore for PostgreSQLStore {
    fn name(&self) -> &str {
        "postgresql"
    }

    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn ensure_tables(&self, tables: &RecordTables) -> Result<()> {
        let conn = self.client.get_connection().await?;
        conn.batch_execute(&sql::create_tables(tables))
            .await
            .map_err(|e| SplitStoreError::Database(format!("Failed to create tables: {e}")))?;

        tracing::info!(
            current = tables.current(),
            backup = tables.backup(),
            export_marker = ?tables.export_marker(),
            "PostgreSQL tables initialized"
        );
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let conn = self.client.get_connection().await?;
        let begin = format!(
            "BEGIN; SET LOCAL statement_timeout = {}",
            self.client.statement_timeout_ms()
        );
        conn.batch_execute(&begin)
            .await
            .map_err(|e| SplitStoreError::Database(format!("Failed to begin transaction: {e}")))?;

        Ok(Box::new(PostgreSQLTransaction { conn: Some(conn) }))
    }
}

/// An open PostgreSQL transaction on a pooled connection
pub struct PostgreSQLTransaction {
    conn: Option<Object>,
}

impl PostgreSQLTransaction {
    fn conn(&self) -> Result<&Object> {
        self.conn
            .as_ref()
            .ok_or_else(|| SplitStoreError::Database("transaction already finished".to_string()))
    }

    async fn query(&self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>> {
        self.conn()?
            .query(statement, params)
            .await
            .map_err(|e| SplitStoreError::Database(format!("Query failed: {e}")))
    }

    async fn execute(&self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        self.conn()?
            .execute(statement, params)
            .await
            .map_err(|e| SplitStoreError::Database(format!("Statement execution failed: {e}")))
    }

    async fn returning_id(&self, statement: &str, row: &RowData) -> Result<i64> {
        let rows = self
            .query(statement, &[&row.record_key, &row.device, &row.content])
            .await?;
        rows.first()
            .map(|r| r.get::<_, i64>(0))
            .ok_or_else(|| SplitStoreError::Database("write returned no id".to_string()))
    }

    async fn end(mut self: Box<Self>, statement: &str) -> Result<()> {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| SplitStoreError::Database("transaction already finished".to_string()))?;
        match conn.batch_execute(statement).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // The session state is unknown; don't hand it back to the pool.
                drop(Object::take(conn));
                Err(SplitStoreError::Database(format!("{statement} failed: {e}")))
            }
        }
    }
}

fn stored_rows(rows: Vec<Row>) -> Vec<StoredRow> {
    rows.into_iter()
        .map(|row| StoredRow {
            id: row.get("id"),
            record_key: row.get("csruid"),
            device: row.get("device"),
            content: row.get("content"),
        })
        .collect()
}

#[async_trait]
impl StoreTransaction for PostgreSQLTransaction {
    async fn select_by_id(&mut self, table: &str, id: i64) -> Result<Vec<StoredRow>> {
        let rows = self.query(&sql::select_by_id(table), &[&id]).await?;
        Ok(stored_rows(rows))
    }

    async fn select_by_key(&mut self, table: &str, record_key: &str) -> Result<Vec<StoredRow>> {
        let rows = self.query(&sql::select_by_key(table), &[&record_key]).await?;
        Ok(stored_rows(rows))
    }

    async fn select_by_key_prefix(
        &mut self,
        table: &str,
        prefix: &str,
    ) -> Result<Vec<StoredRow>> {
        let pattern = sql::like_prefix_pattern(prefix);
        let rows = self
            .query(&sql::select_by_key_prefix(table), &[&pattern])
            .await?;
        Ok(stored_rows(rows))
    }

    async fn insert(&mut self, table: &str, row: &RowData) -> Result<i64> {
        self.returning_id(&sql::insert(table), row).await
    }

    async fn insert_many(&mut self, table: &str, rows: &[RowData]) -> Result<Vec<i64>> {
        let statement = self
            .conn()?
            .prepare_cached(&sql::insert(table))
            .await
            .map_err(|e| SplitStoreError::Database(format!("Failed to prepare insert: {e}")))?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let inserted = self
                .conn()?
                .query_one(&statement, &[&row.record_key, &row.device, &row.content])
                .await
                .map_err(|e| SplitStoreError::Database(format!("Bulk insert failed: {e}")))?;
            ids.push(inserted.get::<_, i64>(0));
        }
        Ok(ids)
    }

    async fn upsert_by_key(&mut self, table: &str, row: &RowData) -> Result<i64> {
        self.returning_id(&sql::upsert_by_key(table), row).await
    }

    async fn delete_by_key(&mut self, table: &str, record_key: &str) -> Result<u64> {
        self.execute(&sql::delete_by_key(table), &[&record_key]).await
    }

    async fn insert_marker(&mut self, table: &str, record_id: i64) -> Result<bool> {
        let inserted = self
            .execute(&sql::insert_marker(table), &[&record_id])
            .await?;
        Ok(inserted == 1)
    }

    async fn delete_marker(&mut self, table: &str, record_id: i64) -> Result<u64> {
        self.execute(&sql::delete_marker(table), &[&record_id]).await
    }

    async fn marker_exported_at(
        &mut self,
        table: &str,
        record_id: i64,
    ) -> Result<Option<DateTime<Utc>>> {
        let rows = self
            .query(&sql::marker_exported_at(table), &[&record_id])
            .await?;
        Ok(rows.first().map(|r| r.get("exported_at")))
    }

    async fn select_unmarked(
        &mut self,
        current_table: &str,
        marker_table: &str,
        limit: i64,
    ) -> Result<Vec<StoredRow>> {
        let rows = self
            .query(&sql::select_unmarked(current_table, marker_table), &[&limit])
            .await?;
        Ok(stored_rows(rows))
    }

    async fn try_advisory_xact_lock(&mut self, key: LockKey) -> Result<bool> {
        let rows = self
            .query(sql::TRY_ADVISORY_XACT_LOCK, &[&key.high, &key.low])
            .await
            .map_err(|e| SplitStoreError::Lock(format!("Advisory lock attempt failed: {e}")))?;
        rows.first()
            .map(|r| r.get::<_, bool>(0))
            .ok_or_else(|| SplitStoreError::Lock("advisory lock query returned no row".to_string()))
    }

    async fn advisory_xact_lock(&mut self, key: LockKey) -> Result<()> {
        self.query(sql::ADVISORY_XACT_LOCK, &[&key.high, &key.low])
            .await
            .map_err(|e| SplitStoreError::Lock(format!("Advisory lock wait failed: {e}")))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.end("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.end("ROLLBACK").await
    }
}

impl Drop for PostgreSQLTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!("PostgreSQL transaction dropped unfinished; discarding connection");
            drop(Object::take(conn));
        }
    }
}
