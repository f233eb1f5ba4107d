//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//!
//! # Cart (JSON)
//! GET  /cart                   - Cart view (re-fetched, cache on failure)
//! GET  /cart/count             - Cart count badge (cache only)
//! POST /cart/add               - Add to cart
//! POST /cart/increment         - "+" on a line
//! POST /cart/decrement         - "-" on a line
//! POST /cart/remove            - Remove a line
//! POST /cart/refresh           - Re-fetch from the cart service
//! POST /cart/empty             - Empty the server cart (after checkout)
//!
//! # Session
//! POST /session                - Adopt a user identity
//! POST /logout                 - Clear cart cache and identity
//! ```

pub mod cart;
pub mod session;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .route("/add", post(cart::add))
        .route("/increment", post(cart::increment))
        .route("/decrement", post(cart::decrement))
        .route("/remove", post(cart::remove))
        .route("/refresh", post(cart::refresh))
        .route("/empty", post(cart::empty))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/cart", cart_routes())
        .route("/session", post(session::adopt))
        .route("/logout", post(session::logout))
}
