//! Per-account mutation locks.
//!
//! One lock per account id, shared by every caller in the process and
//! dropped from the registry once nobody holds or awaits it. Two-account
//! callers always take locks in ascending id order.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::UserId;

/// Process-wide registry of account locks.
///
/// An entry lives only while some caller holds or waits for it.
#[derive(Default)]
pub struct AccountLocks {
    locks: Arc<DashMap<UserId, Arc<Mutex<()>>>>,
}

/// Exclusive mutation rights on one or two accounts. Released on drop.
#[must_use]
pub struct AccountGuard {
    guards: Vec<(UserId, OwnedMutexGuard<()>)>,
    locks: Arc<DashMap<UserId, Arc<Mutex<()>>>>,
}

impl Drop for AccountGuard {
    fn drop(&mut self) {
        for (id, guard) in self.guards.drain(..) {
            drop(guard);
            // the shard is write-locked here, so nobody can clone the handle
            // between the count check and the removal
            self.locks
                .remove_if(&id, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, id: &str) -> Arc<Mutex<()>> {
        // clone the handle out so no map shard stays locked across an await
        let entry = self
            .locks
            .entry(id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())));
        Arc::clone(entry.value())
    }

    async fn acquire(&self, id: &str) -> (UserId, OwnedMutexGuard<()>) {
        let guard = self.handle(id).lock_owned().await;
        (id.to_owned(), guard)
    }

    /// Lock a single account.
    pub async fn lock(&self, id: &str) -> AccountGuard {
        let held = self.acquire(id).await;
        AccountGuard {
            guards: vec![held],
            locks: Arc::clone(&self.locks),
        }
    }

    /// Lock two accounts, lowest id first. Equal ids take a single lock.
    pub async fn lock_pair(&self, a: &str, b: &str) -> AccountGuard {
        if a == b {
            return self.lock(a).await;
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        // a cancelled wait on the second lock still releases the first
        let mut guard = self.lock(first).await;
        let second = self.acquire(second).await;
        guard.guards.push(second);
        guard
    }

    /// Number of accounts currently locked or waited on.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
