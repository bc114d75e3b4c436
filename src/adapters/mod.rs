//! Storage integrations for splitstore.
//!
//! This module provides the stores behind the updaters:
//!
//! - [`database`] - Store abstraction layer (trait-based) and factory
//! - [`postgresql`] - PostgreSQL implementation
//! - [`memory`] - In-process implementation for tests and dry runs
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate the relational engine
//! and enable testing without a database. Core code only sees
//! [`database::RecordStore`] and the transactions it hands out.
//!
//! ```rust,no_run
//! use splitstore::adapters::postgresql::{PostgreSQLClient, PostgreSQLStore};
//! use splitstore::adapters::database::{RecordStore, RecordTables};
//! use splitstore::config::{secret_string, PostgreSQLConfig};
//!
//! # async fn example() -> splitstore::domain::Result<()> {
//! let config = PostgreSQLConfig {
//!     connection_string: secret_string("postgresql://app@localhost:5432/app".to_string()),
//!     max_connections: 10,
//!     connection_timeout_seconds: 30,
//!     statement_timeout_seconds: 60,
//!     ssl_mode: "prefer".to_string(),
//! };
//!
//! let store = PostgreSQLStore::new(PostgreSQLClient::new(config)?);
//! store.ensure_tables(&RecordTables::new("fever", "surveys")?).await?;
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod memory;
pub mod postgresql;
