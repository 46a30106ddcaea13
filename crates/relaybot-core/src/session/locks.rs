use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::types::UserId;

type LockMap = DashMap<UserId, Arc<Mutex<()>>>;

/// Per-user async mutexes, created on first use and dropped with the last guard.
#[derive(Default, Clone)]
pub struct UserLocks {
    locks: Arc<LockMap>,
}

/// Holds one user's lock. Releasing the last holder or waiter removes the entry.
pub struct UserLockGuard {
    user_id: UserId,
    locks: Arc<LockMap>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Entry access takes the shard lock, so no new waiter can clone in between.
        self.locks
            .remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the user's lock. Held until the guard is dropped.
    pub async fn acquire(&self, user_id: UserId) -> UserLockGuard {
        let lock = self
            .locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        UserLockGuard {
            user_id,
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// Users with a held or awaited lock.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
