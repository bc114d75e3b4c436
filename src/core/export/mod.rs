//! Export state tracking
//!
//! Which de-identified records have been exported with their current content.

pub mod marker;

pub use marker::{ExportMarkers, PendingRecord};
