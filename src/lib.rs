// splitstore - Versioned edits for records split across two PostgreSQL stores
// Copyright (c) 2025 Splitstore Contributors
// Licensed under the MIT License

//! # splitstore - Split-Store Record Updates
//!
//! splitstore edits records whose content is split into an identifying (PII)
//! projection and a de-identified projection, each living in its own
//! PostgreSQL database and correlated by a shared record key.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Updating** either projection with a full pre-image backup of every
//!   accepted change
//! - **Invalidating** export markers so edited records are exported again
//! - **Serializing** scheduled jobs across processes with transaction-scoped
//!   advisory locks
//!
//! ## Architecture
//!
//! splitstore follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (updater, export markers, advisory locks)
//! - [`adapters`] - Record stores (PostgreSQL, in-memory)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use splitstore::adapters::database::create_split_stores;
//! use splitstore::config::load_config;
//! use splitstore::core::updater::{SplitRecordEditor, Updater};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("splitstore.toml")?;
//!     let stores = create_split_stores(&config)?;
//!
//!     let editor: SplitRecordEditor<serde_json::Value, serde_json::Value> =
//!         SplitRecordEditor::new(
//!             Updater::identifying(stores.identifying, config.records.identifying_tables()?),
//!             Updater::deidentified(stores.deidentified, config.records.deidentified_tables()?)?,
//!         )?;
//!
//!     let change = editor.set_demo(&"a9c2f0e1".parse()?, true).await?;
//!     println!("changed: {}", change.any());
//!     Ok(())
//! }
//! ```
//!
//! ## Scheduled Jobs
//!
//! Every instance may fire the same job; only one runs it:
//!
//! ```rust,no_run
//! use splitstore::core::lock::LockManager;
//!
//! # async fn example(locks: LockManager) -> splitstore::domain::Result<()> {
//! let sent = locks
//!     .run_if_free(
//!         "consent-email",
//!         (),
//!         |_| async { Ok(true) },
//!         |_| async { Ok(false) },
//!     )
//!     .await?;
//! # let _ = sent;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! splitstore uses the [`domain::SplitStoreError`] type for all errors:
//!
//! ```rust,no_run
//! use splitstore::domain::SplitStoreError;
//!
//! fn example() -> Result<(), SplitStoreError> {
//!     let config = splitstore::config::load_config("splitstore.toml")?;
//!     config.records.deidentified_tables()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! Structured logging goes through the `tracing` crate. Record keys are
//! logged in shortened form only.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
