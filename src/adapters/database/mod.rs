//! Database abstraction layer
//!
//! This module provides a trait-based abstraction for record storage,
//! allowing splitstore to run on PostgreSQL in production and on an
//! in-memory store in tests and dry runs.

pub mod factory;
pub mod tables;
pub mod traits;

pub use factory::{create_split_stores, SplitStores};
pub use tables::RecordTables;
pub use traits::{finish, RecordStore, RowData, StoreTransaction, StoredRow};
