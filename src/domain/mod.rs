//! Domain models and types for splitstore.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`RecordKey`], [`RowId`], [`RecordLookup`])
//! - **Record models** ([`CurrentRow`], [`BackupRow`], [`RecordAttributes`])
//! - **Error types** ([`SplitStoreError`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! Keys are parsed once at the edge. A purely numeric string is a row id;
//! anything else is a record key (or a prefix of one):
//!
//! ```rust
//! use splitstore::domain::{RecordKey, RecordLookup, RowId};
//!
//! # fn example() -> splitstore::domain::Result<()> {
//! let by_row: RecordLookup = "42".parse()?;
//! assert_eq!(by_row, RecordLookup::RowId(RowId::new(42)?));
//!
//! let key = RecordKey::new("a9c2f0e1")?;
//! assert!(RecordKey::new("42").is_err());
//! # let _ = key;
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod ids;
pub mod record;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::SplitStoreError;
pub use ids::{RecordKey, RecordLookup, RowId};
pub use record::{BackupRow, CurrentRow, DemoFlag, Projection, RecordAttributes};
pub use result::Result;
