//! PostgreSQL client implementation
//!
//! This module provides the pooled client for one PostgreSQL store.

use crate::config::schema::PostgreSQLConfig;
use crate::domain::{Result, SplitStoreError};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use postgres_native_tls::MakeTlsConnector;
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::NoTls;

/// SSL modes that require an encrypted connection
const TLS_SSL_MODES: [&str; 3] = ["require", "verify-ca", "verify-full"];

/// PostgreSQL client for one store
///
/// Owns the connection pool. Connections are handed out per transaction and
/// returned when the transaction ends.
pub struct PostgreSQLClient {
    /// Connection pool
    pool: Pool,

    /// Configuration
    config: PostgreSQLConfig,
}

impl PostgreSQLClient {
    /// Create a new PostgreSQL client
    ///
    /// # Arguments
    ///
    /// * `config` - PostgreSQL configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is invalid or the pool
    /// cannot be built. No connection is opened until first use.
    pub fn new(config: PostgreSQLConfig) -> Result<Self> {
        let pg_config: tokio_postgres::Config = config
            .connection_string
            .expose_secret()
            .parse()
            .map_err(|e| {
                SplitStoreError::Configuration(format!(
                    "Invalid PostgreSQL connection string: {e}"
                ))
            })?;

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = if TLS_SSL_MODES.contains(&config.ssl_mode.as_str()) {
            let mut builder = native_tls::TlsConnector::builder();
            if config.ssl_mode == "require" {
                // libpq semantics: "require" encrypts but doesn't verify the server
                builder.danger_accept_invalid_certs(true);
            }
            if config.ssl_mode != "verify-full" {
                builder.danger_accept_invalid_hostnames(true);
            }
            let connector = builder.build().map_err(|e| {
                SplitStoreError::Configuration(format!("Failed to build TLS connector: {e}"))
            })?;
            Manager::from_config(pg_config, MakeTlsConnector::new(connector), manager_config)
        } else {
            Manager::from_config(pg_config, NoTls, manager_config)
        };

        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .recycle_timeout(Some(timeout))
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .build()
            .map_err(|e| {
                SplitStoreError::Database(format!("Failed to create connection pool: {e}"))
            })?;

        Ok(Self { pool, config })
    }

    /// Get a connection from the pool
    ///
    /// # Errors
    ///
    /// Returns an error if a connection cannot be obtained.
    pub async fn get_connection(&self) -> Result<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| {
            SplitStoreError::Database(format!("Failed to get connection from pool: {e}"))
        })
    }

    /// Test the connection to PostgreSQL
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.get_connection().await?;

        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| SplitStoreError::Database(format!("Connection test failed: {e}")))?;

        tracing::info!(
            target_db = %self.connection_string_safe(),
            "PostgreSQL connection test successful"
        );
        Ok(())
    }

    /// Statement timeout applied to every transaction, in milliseconds
    pub fn statement_timeout_ms(&self) -> u64 {
        self.config.statement_timeout_seconds * 1000
    }

    /// Get the connection string (without credentials)
    pub fn connection_string_safe(&self) -> String {
        redact_connection_string(self.config.connection_string.expose_secret().as_ref())
    }

    /// Get the pool statistics
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }
}

/// Strips everything before the host part of a connection URL
pub fn redact_connection_string(conn: &str) -> String {
    conn.rsplit_once('@')
        .map(|(_, host)| format!("postgresql://***@{host}"))
        .unwrap_or_else(|| "postgresql://***".to_string())
}
