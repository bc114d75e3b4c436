//! Record updaters
//!
//! - [`Updater`] - load/compare/backup/write/invalidate for one store
//! - [`SplitRecordEditor`] - edits spanning both stores of a record

pub mod protocol;
pub mod split;

pub use protocol::{Payload, Updater};
pub use split::{SplitChange, SplitRecord, SplitRecordEditor};
