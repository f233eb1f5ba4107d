//! Cart service REST client.
//!
//! # Architecture
//!
//! - The cart service is the source of truth - every mutation returns the
//!   full cart, which callers use to replace their cached copy
//! - [`CartApi`] is the seam between the cart store and the network, so the
//!   store can be driven by a scripted fake in tests
//! - [`HttpCartApi`] is the `reqwest` implementation
//!
//! # Endpoints
//!
//! ```text
//! GET    /cart?userId=                         -> Cart
//! POST   /cart/add     {userId, productId, quantity}  -> Cart
//! PUT    /cart         {userId, productId, quantity}  -> Cart (absolute quantity)
//! DELETE /cart/remove?userId=&productId=       -> Cart
//! DELETE /cart/clear   {userId}                -> Cart
//! ```

mod client;
pub mod types;

pub use client::HttpCartApi;

use async_trait::async_trait;
use sellr_core::{Cart, ProductId, UserId};
use thiserror::Error;

/// Errors that can occur when talking to the cart service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request did not reach the server or the connection failed mid-way.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// Response status code.
        status: reqwest::StatusCode,
        /// Truncated response body.
        message: String,
    },

    /// Rate limited by the cart service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The body parsed but does not describe a valid cart.
    #[error("Invalid cart: {0}")]
    InvalidCart(String),
}

/// Operations offered by the server cart service.
///
/// Every call returns the complete cart after the operation.
#[async_trait]
pub trait CartApi: Send + Sync {
    /// Fetch a user's cart.
    async fn get_cart(&self, user_id: &UserId) -> Result<Cart, ApiError>;

    /// Add `quantity` units of a product, creating the line if needed.
    async fn add_item(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Cart, ApiError>;

    /// Set the absolute quantity of a line. Zero or less removes it.
    async fn set_quantity(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<Cart, ApiError>;

    /// Remove a line.
    async fn remove_item(&self, user_id: &UserId, product_id: &ProductId)
    -> Result<Cart, ApiError>;

    /// Remove every line of a user's cart on the server.
    async fn clear_cart(&self, user_id: &UserId) -> Result<Cart, ApiError>;
}
