//! Advisory locks around solution updates.
//!
//! A page reload or double submit can run two updates of the same
//! learner's solution at once. Each update removes the previous ledger
//! rows and writes new ones while holding the lock of its scope, so a
//! concurrent update never interleaves with it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::model::{Attempt, QuestionId};

/// Scope of a solution update: one learner and one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockScope {
    pub active_id: i64,
    pub question_id: QuestionId,
}

impl From<&Attempt> for LockScope {
    fn from(attempt: &Attempt) -> Self {
        Self {
            active_id: attempt.active_id,
            question_id: attempt.question_id,
        }
    }
}

/// Process-wide registry of solution update locks.
///
/// Create one per process and share it with every orchestrator.
#[derive(Debug, Default)]
pub struct SolutionLocks {
    scopes: Mutex<HashMap<LockScope, Arc<AsyncMutex<()>>>>,
}

/// Held while a solution update runs.
#[derive(Debug)]
pub struct SolutionLockGuard {
    scope: LockScope,
    _guard: OwnedMutexGuard<()>,
}

impl SolutionLockGuard {
    pub fn scope(&self) -> LockScope {
        self.scope
    }
}

impl SolutionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock of `scope`.
    pub async fn acquire(&self, scope: LockScope) -> SolutionLockGuard {
        let lock = {
            let mut scopes = self.scopes.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop locks nobody holds or waits for.
            scopes.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(scopes.entry(scope).or_default())
        };
        let guard = lock.lock_owned().await;
        tracing::trace!(?scope, "solution lock acquired");
        SolutionLockGuard {
            scope,
            _guard: guard,
        }
    }

    /// Run `operation` while holding the lock of `scope`.
    pub async fn with_lock<F, Fut, T>(&self, scope: LockScope, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.acquire(scope).await;
        operation().await
    }

    /// Number of scopes currently tracked.
    pub fn tracked_scopes(&self) -> usize {
        self.scopes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
