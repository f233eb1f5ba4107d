//! Session-scoped persistence of the cached cart.
//!
//! The snapshot is a single opaque blob (the JSON-serialized item sequence)
//! read once when a store is created and rewritten after every cache
//! replacement. It lets a session's cart render immediately after its store
//! was dropped for inactivity.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use thiserror::Error;

use sellr_core::CartItems;

/// Errors that can occur when reading or writing a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The stored blob could not be (de)serialized.
    #[error("snapshot serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    /// The backing storage is not available.
    #[error("snapshot storage unavailable: {0}")]
    Unavailable(String),
}

/// Persistence port for the cached cart.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the last saved items, if any.
    async fn load(&self) -> Result<Option<CartItems>, SnapshotError>;

    /// Replace the saved items.
    async fn save(&self, items: &CartItems) -> Result<(), SnapshotError>;

    /// Remove the saved items.
    async fn clear(&self) -> Result<(), SnapshotError>;
}

/// Snapshot held in process memory. Used by tests and single-user tools.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    blob: Mutex<Option<String>>,
}

impl MemorySnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a previously saved cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the items cannot be serialized.
    pub fn with_items(items: &CartItems) -> Result<Self, SnapshotError> {
        Ok(Self {
            blob: Mutex::new(Some(serde_json::to_string(items)?)),
        })
    }

    /// The raw stored blob.
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.blob.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshot {
    async fn load(&self) -> Result<Option<CartItems>, SnapshotError> {
        self.raw()
            .map(|blob| serde_json::from_str(&blob))
            .transpose()
            .map_err(SnapshotError::from)
    }

    async fn save(&self, items: &CartItems) -> Result<(), SnapshotError> {
        let blob = serde_json::to_string(items)?;
        *self.blob.lock().unwrap_or_else(PoisonError::into_inner) = Some(blob);
        Ok(())
    }

    async fn clear(&self) -> Result<(), SnapshotError> {
        *self.blob.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Prefix of every snapshot entry key.
const SNAPSHOT_KEY_PREFIX: &str = "cart_items:";

/// Snapshot blobs for all browser sessions, keyed by cart session key.
///
/// Blobs expire after the session idle timeout, matching the lifetime of
/// the session cookie. Cheap to clone.
#[derive(Clone)]
pub struct SessionSnapshots {
    blobs: Cache<String, String>,
}

impl SessionSnapshots {
    /// Create a blob store whose entries expire after `time_to_idle`.
    #[must_use]
    pub fn new(time_to_idle: Duration) -> Self {
        Self {
            blobs: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(time_to_idle)
                .build(),
        }
    }

    /// Snapshot handle for one session.
    #[must_use]
    pub fn for_session(&self, session_key: &str) -> SessionSnapshot {
        SessionSnapshot {
            blobs: self.blobs.clone(),
            key: format!("{SNAPSHOT_KEY_PREFIX}{session_key}"),
        }
    }
}

/// Snapshot of a single session's cart.
#[derive(Clone)]
pub struct SessionSnapshot {
    blobs: Cache<String, String>,
    key: String,
}

#[async_trait]
impl SnapshotStore for SessionSnapshot {
    async fn load(&self) -> Result<Option<CartItems>, SnapshotError> {
        match self.blobs.get(&self.key).await {
            Some(blob) => Ok(Some(serde_json::from_str(&blob)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, items: &CartItems) -> Result<(), SnapshotError> {
        let blob = serde_json::to_string(items)?;
        self.blobs.insert(self.key.clone(), blob).await;
        Ok(())
    }

    async fn clear(&self) -> Result<(), SnapshotError> {
        self.blobs.invalidate(&self.key).await;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sellr_core::{CartItem, Price, ProductId};

    use super::*;

    fn items() -> CartItems {
        CartItems::new(vec![CartItem {
            product_id: ProductId::parse("A").unwrap(),
            name: "Mug".to_string(),
            price: Price::from_cents(1000),
            image_url: None,
            quantity: 2,
            seller_id: None,
        }])
        .unwrap()
    }

    #[tokio::test]
    async fn test_memory_snapshot_starts_empty() {
        let snapshot = MemorySnapshot::new();
        assert!(snapshot.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_snapshot_save_load_clear() {
        let snapshot = MemorySnapshot::new();
        snapshot.save(&items()).await.unwrap();
        assert_eq!(snapshot.load().await.unwrap(), Some(items()));

        snapshot.clear().await.unwrap();
        assert!(snapshot.load().await.unwrap().is_none());
        assert!(snapshot.raw().is_none());
    }

    #[tokio::test]
    async fn test_memory_snapshot_rejects_corrupt_blob() {
        let snapshot = MemorySnapshot::new();
        *snapshot.blob.lock().unwrap() = Some("not json".to_string());
        assert!(matches!(snapshot.load().await, Err(SnapshotError::Serde(_))));
    }

    #[tokio::test]
    async fn test_session_snapshots_are_isolated() {
        let snapshots = SessionSnapshots::new(Duration::from_secs(60));
        let first = snapshots.for_session("s1");
        let second = snapshots.for_session("s2");

        first.save(&items()).await.unwrap();
        assert_eq!(first.load().await.unwrap(), Some(items()));
        assert!(second.load().await.unwrap().is_none());

        // A new handle for the same session sees the same blob
        let again = snapshots.for_session("s1");
        assert_eq!(again.load().await.unwrap(), Some(items()));

        again.clear().await.unwrap();
        assert!(first.load().await.unwrap().is_none());
    }
}
