//! Per-refset reconciliation locks.
//!
//! A reconciliation holds its refset's lock from the first remote read to the last remote write,
//! so two submissions against the same refset cannot interleave their plans and mutations. The
//! guard is released on every exit path when it is dropped.
//!
//! The locks coordinate this process only; they are not visible to other writers of the
//! terminology store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Guard held for the duration of one reconciliation.
#[derive(Debug)]
pub struct RefsetGuard {
    refset: String,
    _guard: OwnedMutexGuard<()>,
}

impl RefsetGuard {
    pub fn refset(&self) -> &str {
        &self.refset
    }
}

impl Drop for RefsetGuard {
    fn drop(&mut self) {
        tracing::debug!(refset = %self.refset, "released refset lock");
    }
}

/// Lock registry keyed by refset code.
#[derive(Clone, Debug, Default)]
pub struct RefsetLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl RefsetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, refset: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(refset.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait for and take the lock of `refset`.
    pub async fn acquire(&self, refset: &str) -> RefsetGuard {
        let lock = self.lock_for(refset);
        let guard = match lock.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::info!(refset, "refset is being updated; waiting for lock");
                lock.lock_owned().await
            }
        };
        tracing::debug!(refset, "acquired refset lock");
        RefsetGuard {
            refset: refset.to_string(),
            _guard: guard,
        }
    }

    /// True while a reconciliation holds the lock of `refset`.
    pub fn is_updating(&self, refset: &str) -> bool {
        let locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .get(refset)
            .is_some_and(|lock| lock.try_lock().is_err())
    }
}
