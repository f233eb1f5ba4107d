//! Per-product mutation serialization.
//!
//! Rapid +/- clicks on the same product must reach the cart service in the
//! order they were made. [`KeyedLocks`] hands out one async mutex per
//! `(user, product)` pair; entries are dropped once nobody holds them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use sellr_core::{ProductId, UserId};

/// Map size above which dead entries are pruned on insert.
const PRUNE_THRESHOLD: usize = 256;

type LockKey = (UserId, ProductId);

/// Registry of async mutexes keyed by `(user, product)`.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    inner: Arc<Mutex<HashMap<LockKey, Weak<AsyncMutex<()>>>>>,
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a `(user, product)` pair.
    ///
    /// Waiters are granted the lock in FIFO order.
    pub async fn lock(&self, user_id: &UserId, product_id: &ProductId) -> OwnedMutexGuard<()> {
        let mutex = self.entry(user_id, product_id);
        mutex.lock_owned().await
    }

    fn entry(&self, user_id: &UserId, product_id: &ProductId) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (user_id.clone(), product_id.clone());

        if let Some(existing) = map.get(&key).and_then(Weak::upgrade) {
            return existing;
        }

        if map.len() >= PRUNE_THRESHOLD {
            map.retain(|_, weak| weak.strong_count() > 0);
        }

        let mutex = Arc::new(AsyncMutex::new(()));
        map.insert(key, Arc::downgrade(&mutex));
        mutex
    }

    /// Number of keys currently tracked (live or not yet pruned).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn ids(user: &str, product: &str) -> (UserId, ProductId) {
        (UserId::parse(user).unwrap(), ProductId::parse(product).unwrap())
    }

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = KeyedLocks::new();
        let (user, product) = ids("u1", "A");

        let guard = locks.lock(&user, &product).await;
        let second = tokio::time::timeout(Duration::from_millis(50), locks.lock(&user, &product));
        assert!(second.await.is_err(), "second lock should wait");

        drop(guard);
        let second = tokio::time::timeout(Duration::from_millis(50), locks.lock(&user, &product));
        assert!(second.await.is_ok());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let (user, a) = ids("u1", "A");
        let (_, b) = ids("u1", "B");

        let _guard = locks.lock(&user, &a).await;
        let other = tokio::time::timeout(Duration::from_millis(50), locks.lock(&user, &b));
        assert!(other.await.is_ok());
    }

    #[tokio::test]
    async fn test_same_product_different_users_do_not_block() {
        let locks = KeyedLocks::new();
        let (alice, a) = ids("alice", "A");
        let (bob, _) = ids("bob", "A");

        let _guard = locks.lock(&alice, &a).await;
        let other = tokio::time::timeout(Duration::from_millis(50), locks.lock(&bob, &a));
        assert!(other.await.is_ok());
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = KeyedLocks::new();
        for i in 0..(PRUNE_THRESHOLD * 2) {
            let (user, product) = ids("u1", &format!("p{i}"));
            drop(locks.lock(&user, &product).await);
        }
        assert!(locks.len() <= PRUNE_THRESHOLD + 1);
    }
}
