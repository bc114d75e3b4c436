//! Cross-process mutual exclusion on transaction-scoped advisory locks
//!
//! Every guarded call opens its own store transaction and takes the advisory
//! lock inside it. The lock is released when that transaction ends, whether
//! the body succeeded or failed; there is no explicit unlock.

use super::key::LockKey;
use super::registry::ScopeRegistry;
use crate::adapters::database::traits::{finish, RecordStore};
use crate::domain::Result;
use crate::log_lock_outcome;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// Runs job bodies under scoped advisory locks
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn RecordStore>,
    registry: Arc<ScopeRegistry>,
}

impl LockManager {
    /// Creates a manager with its own scope registry
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_registry(store, Arc::new(ScopeRegistry::new()))
    }

    /// Creates a manager that reports collisions through `registry`
    pub fn with_registry(store: Arc<dyn RecordStore>, registry: Arc<ScopeRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }

    /// Key used for `scope` (recorded in the registry)
    pub fn key_for(&self, scope: &str) -> LockKey {
        self.registry.register(scope)
    }

    /// Runs `on_acquired` if no other transaction holds the lock of `scope`,
    /// `on_not_acquired` otherwise
    ///
    /// Never waits for the lock. When acquired, the transaction commits if
    /// `on_acquired` returns `Ok` and rolls back if it returns `Err`; the
    /// skip branch always rolls back.
    ///
    /// # Errors
    ///
    /// The error of whichever branch ran, or a store error while opening the
    /// transaction or attempting the lock.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use splitstore::core::lock::LockManager;
    /// # async fn example(locks: LockManager) -> splitstore::domain::Result<()> {
    /// let exported = locks
    ///     .run_if_free(
    ///         "export-job",
    ///         100usize,
    ///         |batch| async move { Ok(batch) },
    ///         |_| async { Ok(0) },
    ///     )
    ///     .await?;
    /// # let _ = exported;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_if_free<A, T, Acq, AcqFut, Skip, SkipFut>(
        &self,
        scope: &str,
        args: A,
        on_acquired: Acq,
        on_not_acquired: Skip,
    ) -> Result<T>
    where
        Acq: FnOnce(A) -> AcqFut,
        AcqFut: Future<Output = Result<T>>,
        Skip: FnOnce(A) -> SkipFut,
        SkipFut: Future<Output = Result<T>>,
    {
        let key = self.key_for(scope);
        let mut tx = self.store.begin().await?;

        let acquired = match tx.try_advisory_xact_lock(key).await {
            Ok(acquired) => acquired,
            Err(e) => return finish(tx, Err(e)).await,
        };
        log_lock_outcome!(scope, key, acquired);

        if acquired {
            let outcome = on_acquired(args).await;
            if let Err(ref e) = outcome {
                tracing::warn!(scope, error = %e, "Locked job failed, rolling back");
            }
            return finish(tx, outcome).await;
        }

        let outcome = on_not_acquired(args).await;
        if let Err(e) = tx.rollback().await {
            tracing::warn!(scope, error = %e, "Rollback after skipped lock failed");
        }
        outcome
    }

    /// Runs `body` once the lock of `scope` is free, waiting as long as it
    /// takes
    ///
    /// For request paths that must serialize rather than skip, like handing
    /// out items from a shared pool.
    pub async fn run_when_free<T, F, Fut>(&self, scope: &str, body: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let key = self.key_for(scope);
        let mut tx = self.store.begin().await?;

        if let Err(e) = tx.advisory_xact_lock(key).await {
            return finish(tx, Err(e)).await;
        }
        tracing::debug!(scope, lock_key = %key, "Advisory lock acquired after wait");

        let outcome = body().await;
        finish(tx, outcome).await
    }

    /// Wraps a job in a reusable lock-guarded entry point
    ///
    /// Each [`ScheduledJob::run`] is one [`run_if_free`](Self::run_if_free)
    /// call.
    pub fn scheduled<A, T, F, G>(
        &self,
        scope: impl Into<String>,
        on_acquired: F,
        on_not_acquired: G,
    ) -> ScheduledJob<A, T>
    where
        F: Fn(A) -> BoxFuture<'static, Result<T>> + Send + Sync + 'static,
        G: Fn(A) -> BoxFuture<'static, Result<T>> + Send + Sync + 'static,
    {
        ScheduledJob {
            manager: self.clone(),
            scope: scope.into(),
            on_acquired: Arc::new(on_acquired),
            on_not_acquired: Arc::new(on_not_acquired),
        }
    }
}

type JobFn<A, T> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// A job entry point guarded by an advisory lock
pub struct ScheduledJob<A, T> {
    manager: LockManager,
    scope: String,
    on_acquired: JobFn<A, T>,
    on_not_acquired: JobFn<A, T>,
}

impl<A, T> Clone for ScheduledJob<A, T> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            scope: self.scope.clone(),
            on_acquired: Arc::clone(&self.on_acquired),
            on_not_acquired: Arc::clone(&self.on_not_acquired),
        }
    }
}

impl<A, T> ScheduledJob<A, T> {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// One guarded invocation
    pub async fn run(&self, args: A) -> Result<T> {
        self.manager
            .run_if_free(
                &self.scope,
                args,
                |a| (self.on_acquired)(a),
                |a| (self.on_not_acquired)(a),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::traits::StoreTransaction;
    use crate::adapters::memory::MemoryStore;
    use crate::domain::SplitStoreError;

    #[tokio::test]
    async fn test_free_lock_runs_body() {
        let manager = LockManager::new(Arc::new(MemoryStore::new()));
        let result = manager
            .run_if_free("nightly", 2, |n| async move { Ok(n * 10) }, |_| async { Ok(0) })
            .await
            .unwrap();
        assert_eq!(result, 20);
        assert_eq!(manager.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_skip_branch_error_propagates() {
        let store = MemoryStore::new();
        let manager = LockManager::new(Arc::new(store.clone()));

        let mut holder = store.begin().await.unwrap();
        assert!(holder
            .try_advisory_xact_lock(LockKey::derive("nightly"))
            .await
            .unwrap());

        let result: Result<()> = manager
            .run_if_free(
                "nightly",
                (),
                |_| async { Ok(()) },
                |_| async { Err(SplitStoreError::Other("busy".to_string())) },
            )
            .await;
        assert!(matches!(result, Err(SplitStoreError::Other(_))));
        holder.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_run_when_free_releases_lock() {
        let store = MemoryStore::new();
        let manager = LockManager::new(Arc::new(store.clone()));

        let value = manager
            .run_when_free("giftcard", || async { Ok("allocated") })
            .await
            .unwrap();
        assert_eq!(value, "allocated");
        assert_eq!(store.held_lock_count(), 0);
    }
}
