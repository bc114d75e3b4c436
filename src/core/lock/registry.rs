//! Scope registry for lock-key collision detection
//!
//! Two scopes can hash to the same key pair. That only adds contention
//! between unrelated jobs, so it is reported, never corrected.

use super::key::LockKey;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

#[derive(Default)]
struct RegistryState {
    first_seen: HashMap<LockKey, String>,
    reported: HashSet<String>,
}

/// Maps each derived key to the first scope seen for it
///
/// Owned by a [`super::LockManager`]; share one explicitly (behind an `Arc`)
/// if several managers should detect collisions together.
#[derive(Default)]
pub struct ScopeRegistry {
    state: Mutex<RegistryState>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives the key of `scope` and records it
    pub fn register(&self, scope: &str) -> LockKey {
        let key = LockKey::derive(scope);
        self.record(scope, key);
        key
    }

    /// Records that `scope` maps to `key`
    ///
    /// Returns the first-seen scope if `scope` collides with it. The warning
    /// is logged only the first time a given scope collides.
    pub fn record(&self, scope: &str, key: LockKey) -> Option<String> {
        // Diagnostics only; a poisoned map is still good enough to read.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let first = state
            .first_seen
            .entry(key)
            .or_insert_with(|| scope.to_string())
            .clone();
        if first == scope {
            return None;
        }

        if state.reported.insert(scope.to_string()) {
            tracing::warn!(
                scope,
                first_scope = %first,
                lock_key = %key,
                "Advisory lock key collision; these scopes will serialize against each other"
            );
        }
        Some(first)
    }

    /// Number of distinct colliding scopes reported so far
    pub fn reported_collisions(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reported
            .len()
    }

    /// Number of distinct keys seen
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .first_seen
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_stable() {
        let registry = ScopeRegistry::new();
        let a = registry.register("consent-email");
        let b = registry.register("consent-email");
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.reported_collisions(), 0);
    }

    #[test]
    fn test_collision_reported_once() {
        let registry = ScopeRegistry::new();
        let key = LockKey::from_parts(7, 11);

        assert_eq!(registry.record("export-job", key), None);
        assert_eq!(
            registry.record("giftcard", key),
            Some("export-job".to_string())
        );
        assert_eq!(
            registry.record("giftcard", key),
            Some("export-job".to_string())
        );
        assert_eq!(registry.reported_collisions(), 1);

        // The first-seen scope itself never counts as colliding
        assert_eq!(registry.record("export-job", key), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registries_are_independent() {
        let first = ScopeRegistry::new();
        let second = ScopeRegistry::new();
        let key = LockKey::from_parts(1, 2);

        first.record("a", key);
        first.record("b", key);
        assert_eq!(second.record("b", key), None);
        assert_eq!(first.reported_collisions(), 1);
        assert_eq!(second.reported_collisions(), 0);
    }
}
