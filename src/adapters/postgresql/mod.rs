//! PostgreSQL database integration
//!
//! This module provides the production [`RecordStore`](crate::adapters::database::RecordStore)
//! backed by tokio-postgres and a deadpool connection pool.

pub mod client;
pub mod sql;
pub mod store;

pub use client::PostgreSQLClient;
pub use store::{PostgreSQLStore, PostgreSQLTransaction};
