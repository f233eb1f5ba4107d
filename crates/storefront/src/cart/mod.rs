//! Client-side cart cache kept in sync with the cart service.
//!
//! # Contract
//!
//! Every mutation is server-first: the cart service is called, and only a
//! successful response replaces the cached items (and the session snapshot).
//! A failed call leaves the cache exactly as it was.
//!
//! # Ordering
//!
//! - Mutations on the same `(user, product)` are serialized through
//!   [`KeyedLocks`], so they are applied in the order they were issued.
//! - Mutation responses on different products are applied in completion
//!   order. Each is a full cart reflecting every change the server has
//!   processed so far, including ones whose responses are still in flight.
//! - A fetch is a plain read. Its response is discarded if an operation
//!   issued after it has already been applied, and the caller gets the
//!   current cache.
//! - [`CartStore::clear`] and [`CartStore::detach`] start a new epoch.
//!   Responses to operations issued in an earlier epoch are never applied and
//!   the operation returns [`CartError::Cancelled`].
//!
//! # Example
//!
//! ```rust,ignore
//! let store = CartStore::restore(api, snapshot, locks).await;
//! store.fetch(&user_id).await?;
//! store.add_item(&user_id, &product).await?;
//! store.update_quantity(&user_id, &product.product_id, -1).await?;
//! ```

mod error;
mod locks;
mod registry;
pub mod snapshot;

pub use error::CartError;
pub use locks::KeyedLocks;
pub use registry::CartRegistry;
pub use snapshot::{MemorySnapshot, SessionSnapshot, SessionSnapshots, SnapshotError, SnapshotStore};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use sellr_core::{Cart, CartItems, ProductId, ProductSummary, UserId};

use crate::api::CartApi;

/// What produced a server response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Fetch,
    Mutation,
}

/// Identifies when an operation was issued.
#[derive(Debug, Clone, Copy)]
struct Ticket {
    seq: u64,
    epoch: u64,
    origin: Origin,
}

struct CacheState {
    items: CartItems,
    /// Highest sequence number among applied responses.
    applied: u64,
}

/// Cached cart for one browser session.
pub struct CartStore {
    api: Arc<dyn CartApi>,
    snapshot: Arc<dyn SnapshotStore>,
    locks: KeyedLocks,
    state: Mutex<CacheState>,
    next_seq: AtomicU64,
    epoch: AtomicU64,
}

impl CartStore {
    /// Create a store with an empty cache.
    #[must_use]
    pub fn new(api: Arc<dyn CartApi>, snapshot: Arc<dyn SnapshotStore>, locks: KeyedLocks) -> Self {
        Self::with_items(api, snapshot, locks, CartItems::empty())
    }

    /// Create a store, restoring the cache from the snapshot.
    ///
    /// An unreadable snapshot is logged and the store starts empty.
    pub async fn restore(
        api: Arc<dyn CartApi>,
        snapshot: Arc<dyn SnapshotStore>,
        locks: KeyedLocks,
    ) -> Self {
        let items = match snapshot.load().await {
            Ok(Some(items)) => {
                debug!(items = items.len(), "Restored cart from snapshot");
                items
            }
            Ok(None) => CartItems::empty(),
            Err(e) => {
                warn!(error = %e, "Failed to restore cart snapshot, starting empty");
                CartItems::empty()
            }
        };
        Self::with_items(api, snapshot, locks, items)
    }

    fn with_items(
        api: Arc<dyn CartApi>,
        snapshot: Arc<dyn SnapshotStore>,
        locks: KeyedLocks,
        items: CartItems,
    ) -> Self {
        Self {
            api,
            snapshot,
            locks,
            state: Mutex::new(CacheState { items, applied: 0 }),
            next_seq: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
        }
    }

    /// Current cached items.
    pub async fn items(&self) -> CartItems {
        self.state.lock().await.items.clone()
    }

    /// Quantity of a product in the cache, 0 when absent.
    pub async fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.state.lock().await.items.quantity_of(product_id)
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Replace the cache with the server's cart.
    ///
    /// # Errors
    ///
    /// Returns a remote error if the cart service call fails; the cache is
    /// left unchanged.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn fetch(&self, user_id: &UserId) -> Result<CartItems, CartError> {
        let ticket = self.issue(Origin::Fetch);
        let cart = self.api.get_cart(user_id).await.map_err(|e| fail("fetch", e))?;
        self.reconcile(ticket, user_id, cart).await
    }

    /// Add one unit of a product.
    ///
    /// # Errors
    ///
    /// Returns a remote error if the cart service call fails; the cache is
    /// left unchanged.
    pub async fn add_item(
        &self,
        user_id: &UserId,
        product: &ProductSummary,
    ) -> Result<CartItems, CartError> {
        self.add_item_quantity(user_id, product, 1).await
    }

    /// Add `quantity` units of a product.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Precondition` for a zero quantity, or a remote
    /// error if the cart service call fails.
    #[instrument(
        skip(self, product),
        fields(user_id = %user_id, product_id = %product.product_id, name = %product.name)
    )]
    pub async fn add_item_quantity(
        &self,
        user_id: &UserId,
        product: &ProductSummary,
        quantity: u32,
    ) -> Result<CartItems, CartError> {
        if quantity == 0 {
            return Err(CartError::Precondition(
                "quantity to add must be at least 1".to_string(),
            ));
        }

        let _guard = self.locks.lock(user_id, &product.product_id).await;
        let ticket = self.issue(Origin::Mutation);
        let cart = self
            .api
            .add_item(user_id, &product.product_id, quantity)
            .await
            .map_err(|e| fail("add_item", e))?;
        self.reconcile(ticket, user_id, cart).await
    }

    /// Change a cached product's quantity by `delta`.
    ///
    /// The cart service receives the resulting absolute quantity; zero or
    /// less removes the line. A zero `delta` returns the cache untouched.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Precondition` without calling the cart service if
    /// the product is not in the cache, or a remote error if the call fails.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn update_quantity(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        delta: i64,
    ) -> Result<CartItems, CartError> {
        let _guard = self.locks.lock(user_id, product_id).await;

        let current = {
            let state = self.state.lock().await;
            match state.items.get(product_id) {
                Some(item) => item.quantity,
                None => {
                    return Err(CartError::Precondition(format!(
                        "product {product_id} is not in the cart"
                    )));
                }
            }
        };

        if delta == 0 {
            return Ok(self.items().await);
        }

        let new_quantity = i64::from(current).saturating_add(delta);
        debug!(current, new_quantity, "Setting cart quantity");

        let ticket = self.issue(Origin::Mutation);
        let cart = self
            .api
            .set_quantity(user_id, product_id, new_quantity)
            .await
            .map_err(|e| fail("update_quantity", e))?;
        self.reconcile(ticket, user_id, cart).await
    }

    /// Remove a product from the cart.
    ///
    /// # Errors
    ///
    /// Returns a remote error if the cart service call fails; the cache is
    /// left unchanged.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn remove_item(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<CartItems, CartError> {
        let _guard = self.locks.lock(user_id, product_id).await;
        let ticket = self.issue(Origin::Mutation);
        let cart = self
            .api
            .remove_item(user_id, product_id)
            .await
            .map_err(|e| fail("remove_item", e))?;
        self.reconcile(ticket, user_id, cart).await
    }

    /// Empty the user's cart on the server (after checkout).
    ///
    /// Unlike [`CartStore::clear`], this removes the server-side lines.
    ///
    /// # Errors
    ///
    /// Returns a remote error if the cart service call fails; the cache is
    /// left unchanged.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn empty_remote(&self, user_id: &UserId) -> Result<CartItems, CartError> {
        let ticket = self.issue(Origin::Mutation);
        let cart = self
            .api
            .clear_cart(user_id)
            .await
            .map_err(|e| fail("empty_remote", e))?;
        self.reconcile(ticket, user_id, cart).await
    }

    /// Empty the cache and the snapshot without contacting the server.
    ///
    /// In-flight responses are discarded.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Snapshot` if the snapshot could not be removed.
    /// The cache is empty either way.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), CartError> {
        self.epoch.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock().await;
        state.items = CartItems::empty();
        state.applied = self.next_seq.load(Ordering::SeqCst);

        self.snapshot.clear().await.map_err(|e| {
            warn!(error = %e, "Failed to clear cart snapshot");
            CartError::from(e)
        })
    }

    /// Stop applying responses to operations that are still in flight.
    ///
    /// Used when the view that issued them is gone. Later operations work
    /// normally.
    pub fn detach(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    fn issue(&self, origin: Origin) -> Ticket {
        // Epoch first: a clear() racing with this call must win.
        let epoch = self.epoch.load(Ordering::SeqCst);
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket { seq, epoch, origin }
    }

    /// Replace the cache with a server response, if it is still current.
    async fn reconcile(
        &self,
        ticket: Ticket,
        user_id: &UserId,
        cart: Cart,
    ) -> Result<CartItems, CartError> {
        if &cart.user_id != user_id {
            warn!(
                expected = %user_id,
                received = %cart.user_id,
                "Cart service returned another user's cart"
            );
            return Err(CartError::Decode(format!(
                "expected cart for {user_id}, got {}",
                cart.user_id
            )));
        }

        let mut state = self.state.lock().await;

        if ticket.epoch != self.epoch.load(Ordering::SeqCst) {
            debug!(seq = ticket.seq, "Dropping response for cancelled operation");
            return Err(CartError::Cancelled);
        }

        if ticket.origin == Origin::Fetch && ticket.seq <= state.applied {
            debug!(
                seq = ticket.seq,
                applied = state.applied,
                "Discarding superseded cart read"
            );
            return Ok(state.items.clone());
        }

        state.items = cart.items;
        state.applied = state.applied.max(ticket.seq);

        // Written under the state lock so snapshots land in the same order
        // as cache replacements.
        if let Err(e) = self.snapshot.save(&state.items).await {
            warn!(error = %e, "Failed to persist cart snapshot");
        }

        Ok(state.items.clone())
    }
}

/// Log a failed cart service call and convert its error.
fn fail(operation: &'static str, err: crate::api::ApiError) -> CartError {
    let err = CartError::from(err);
    warn!(operation, error = %err, "Cart operation failed");
    err
}
