//! Advisory locks for scheduled jobs
//!
//! Several application instances may fire the same scheduled job at the same
//! moment. Wrapping the job in [`LockManager::run_if_free`] makes exactly one
//! of them run it; the others take the skip branch.

pub mod key;
pub mod manager;
pub mod registry;

pub use key::LockKey;
pub use manager::{LockManager, ScheduledJob};
pub use registry::ScopeRegistry;
