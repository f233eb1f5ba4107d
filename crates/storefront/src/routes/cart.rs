//! Cart route handlers.
//!
//! Each gesture maps to exactly one cart store call. Handlers never touch
//! the cache directly; every response renders the store's items after the
//! call.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use sellr_core::{CartItem, CartItems, Price, ProductId, ProductSummary, SellerId};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireUser;
use crate::state::AppState;

/// Cart line display data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemView {
    pub product_id: ProductId,
    pub name: String,
    pub image_url: Option<String>,
    pub seller_id: Option<SellerId>,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
}

/// Cart display data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u32,
    /// False when the cart service could not be reached and the cached
    /// items are shown instead.
    pub synced: bool,
}

impl CartView {
    pub(crate) fn stale(mut self) -> Self {
        self.synced = false;
        self
    }
}

impl From<&CartItem> for CartItemView {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            name: item.name.clone(),
            image_url: item.image_url.clone(),
            seller_id: item.seller_id.clone(),
            quantity: item.quantity,
            price: item.price.display(),
            line_price: item.line_total().display(),
        }
    }
}

impl From<&CartItems> for CartView {
    fn from(items: &CartItems) -> Self {
        Self {
            items: items.iter().map(CartItemView::from).collect(),
            subtotal: items.subtotal().display(),
            item_count: items.total_quantity(),
            synced: true,
        }
    }
}

/// Cart count badge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CartCount {
    pub count: u32,
}

/// Add-to-cart request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub seller_id: Option<SellerId>,
    #[serde(default)]
    pub quantity: Option<u32>,
}

impl AddToCartRequest {
    fn product(&self) -> ProductSummary {
        ProductSummary {
            product_id: self.product_id.clone(),
            name: self.name.clone(),
            price: self.price,
            image_url: self.image_url.clone(),
            seller_id: self.seller_id.clone(),
        }
    }
}

/// Request naming a single cart line.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineRequest {
    pub product_id: ProductId,
}

/// Show the cart, re-fetched from the cart service.
///
/// Falls back to the cached items if the fetch fails.
#[instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Json<CartView> {
    let store = state.carts().store_for(&user.cart_key).await;
    match store.fetch(&user.user_id).await {
        Ok(items) => Json(CartView::from(&items)),
        Err(e) => {
            warn!(error = %e, "Showing cached cart");
            Json(CartView::from(&store.items().await).stale())
        }
    }
}

/// Cart count badge, from the cache only.
pub async fn count(State(state): State<AppState>, RequireUser(user): RequireUser) -> Json<CartCount> {
    let store = state.carts().store_for(&user.cart_key).await;
    Json(CartCount {
        count: store.items().await.total_quantity(),
    })
}

/// Add a product (one unit unless a quantity is given).
#[instrument(skip_all, fields(user_id = %user.user_id, product_id = %request.product_id))]
pub async fn add(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<CartView>> {
    add_breadcrumb(
        "cart",
        "Added to cart",
        &[("product_id", request.product_id.as_str())],
    );

    let store = state.carts().store_for(&user.cart_key).await;
    let items = store
        .add_item_quantity(&user.user_id, &request.product(), request.quantity.unwrap_or(1))
        .await?;
    Ok(Json(CartView::from(&items)))
}

/// "+" on a cart line.
#[instrument(skip_all, fields(user_id = %user.user_id, product_id = %request.product_id))]
pub async fn increment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<CartLineRequest>,
) -> Result<Json<CartView>> {
    let store = state.carts().store_for(&user.cart_key).await;
    let items = store
        .update_quantity(&user.user_id, &request.product_id, 1)
        .await?;
    Ok(Json(CartView::from(&items)))
}

/// "-" on a cart line. Going below one removes the line.
#[instrument(skip_all, fields(user_id = %user.user_id, product_id = %request.product_id))]
pub async fn decrement(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<CartLineRequest>,
) -> Result<Json<CartView>> {
    let store = state.carts().store_for(&user.cart_key).await;
    let items = store
        .update_quantity(&user.user_id, &request.product_id, -1)
        .await?;
    Ok(Json(CartView::from(&items)))
}

/// Remove a cart line.
#[instrument(skip_all, fields(user_id = %user.user_id, product_id = %request.product_id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<CartLineRequest>,
) -> Result<Json<CartView>> {
    let store = state.carts().store_for(&user.cart_key).await;
    let items = store.remove_item(&user.user_id, &request.product_id).await?;
    Ok(Json(CartView::from(&items)))
}

/// Re-fetch the cart, reporting failures.
#[instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn refresh(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<CartView>> {
    let store = state.carts().store_for(&user.cart_key).await;
    let items = store.fetch(&user.user_id).await?;
    Ok(Json(CartView::from(&items)))
}

/// Empty the cart on the server after checkout.
#[instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn empty(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<CartView>> {
    let store = state.carts().store_for(&user.cart_key).await;
    let items = store.empty_remote(&user.user_id).await?;
    Ok(Json(CartView::from(&items)))
}
