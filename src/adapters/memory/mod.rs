//! In-memory store
//!
//! Implements the database traits without a server. Used by the test suite
//! and by dry runs of the command line tool.

mod change;
pub mod store;

pub use store::{MemoryStore, MemoryTransaction};
