//! Core logic of splitstore.
//!
//! # Modules
//!
//! - [`updater`] - Versioned edits with backup and export invalidation
//! - [`export`] - Export markers and pending-record listing
//! - [`lock`] - Advisory locks serializing scheduled jobs across processes
//!
//! # Example
//!
//! ```rust,no_run
//! use splitstore::adapters::memory::MemoryStore;
//! use splitstore::adapters::database::{RecordStore, RecordTables};
//! use splitstore::core::updater::Updater;
//! use std::sync::Arc;
//!
//! # async fn example() -> splitstore::domain::Result<()> {
//! let tables = RecordTables::new("fever", "surveys")?
//!     .with_export_marker("fever_export_markers")?;
//! let store = MemoryStore::new();
//! store.ensure_tables(&tables).await?;
//!
//! let updater: Updater<serde_json::Value> = Updater::deidentified(Arc::new(store), tables)?;
//! let current = updater.load(&"a9c2f0e1".parse()?).await?;
//! let changed = updater.set_demo(&current, true).await?;
//! println!("changed: {changed}");
//! # Ok(())
//! # }
//! ```

pub mod export;
pub mod lock;
pub mod updater;
