//! One long-lived [`CartStore`] per browser session.
//!
//! Requests from the same session share a store, so a second click reads
//! the cache the first click produced. Idle stores are evicted (and
//! detached) with the same timeout as their snapshots; the next request
//! rebuilds the store from the snapshot.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use moka::notification::RemovalCause;
use tracing::debug;

use super::{CartStore, KeyedLocks, SessionSnapshots};
use crate::api::CartApi;

/// Maximum number of live stores.
const MAX_STORES: u64 = 50_000;

/// Session-keyed registry of cart stores. Cheap to clone.
#[derive(Clone)]
pub struct CartRegistry {
    api: Arc<dyn CartApi>,
    snapshots: SessionSnapshots,
    locks: KeyedLocks,
    stores: Cache<String, Arc<CartStore>>,
}

impl CartRegistry {
    /// Create a registry whose stores and snapshots expire after `idle_timeout`.
    #[must_use]
    pub fn new(api: Arc<dyn CartApi>, idle_timeout: Duration) -> Self {
        let stores = Cache::builder()
            .max_capacity(MAX_STORES)
            .time_to_idle(idle_timeout)
            .eviction_listener(
                |key: Arc<String>, store: Arc<CartStore>, cause: RemovalCause| {
                    debug!(session = %key, ?cause, "Dropping cart store");
                    store.detach();
                },
            )
            .build();

        Self {
            api,
            snapshots: SessionSnapshots::new(idle_timeout),
            locks: KeyedLocks::new(),
            stores,
        }
    }

    /// The store for a session, restoring it from its snapshot if needed.
    pub async fn store_for(&self, session_key: &str) -> Arc<CartStore> {
        let api = Arc::clone(&self.api);
        let snapshot = Arc::new(self.snapshots.for_session(session_key));
        let locks = self.locks.clone();

        self.stores
            .get_with(session_key.to_string(), async move {
                Arc::new(CartStore::restore(api, snapshot, locks).await)
            })
            .await
    }

    /// Drop a session's store. In-flight responses for it are discarded.
    pub async fn forget(&self, session_key: &str) {
        if let Some(store) = self.stores.remove(session_key).await {
            store.detach();
        }
    }

    /// Number of live stores.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.stores.entry_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
