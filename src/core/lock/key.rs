//! Advisory lock keys
//!
//! PostgreSQL's two-argument advisory lock functions take a pair of `int4`
//! values. Scope strings are mapped onto that pair through SHA-256, which
//! keeps the mapping stable across processes and restarts.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Two-integer key for `pg_try_advisory_xact_lock(int4, int4)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LockKey {
    /// First argument (digest bytes 0..4, big-endian)
    pub high: i32,
    /// Second argument (digest bytes 4..8, big-endian)
    pub low: i32,
}

impl LockKey {
    /// Derives the key for a scope string
    ///
    /// # Examples
    ///
    /// ```
    /// use splitstore::core::lock::LockKey;
    ///
    /// assert_eq!(LockKey::derive("export-job"), LockKey::derive("export-job"));
    /// assert_ne!(LockKey::derive("export-job"), LockKey::derive("consent-email"));
    /// ```
    pub fn derive(scope: &str) -> Self {
        let digest = Sha256::digest(scope.as_bytes());
        let high = i32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        let low = i32::from_be_bytes([digest[4], digest[5], digest[6], digest[7]]);
        Self { high, low }
    }

    /// Builds a key from raw parts
    pub fn from_parts(high: i32, low: i32) -> Self {
        Self { high, low }
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}{:08x}", self.high as u32, self.low as u32)
    }
}
