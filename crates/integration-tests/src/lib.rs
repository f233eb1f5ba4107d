//! Integration test harness for the Sellr storefront.
//!
//! [`FakeCartService`] serves the cart service REST contract from memory on
//! an ephemeral port. [`spawn_storefront`] runs the storefront router against
//! any cart service URL, so tests can drive the whole stack over real HTTP.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p sellr-integration-tests
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::net::TcpListener;
use url::Url;

use sellr_storefront::api::types::{CartDto, CartItemDto, CartLineRequest, ClearCartRequest};
use sellr_storefront::config::StorefrontConfig;
use sellr_storefront::state::AppState;

/// A product the fake cart service knows about.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: &'static str,
    pub name: &'static str,
    pub price: Decimal,
    pub seller_id: Option<&'static str>,
}

impl Product {
    #[must_use]
    pub fn new(id: &'static str, name: &'static str, cents: i64) -> Self {
        Self {
            id,
            name,
            price: Decimal::new(cents, 2),
            seller_id: None,
        }
    }

    fn line(&self, quantity: i64) -> CartItemDto {
        CartItemDto {
            product_id: self.id.to_string(),
            name: Some(self.name.to_string()),
            image_url: Some(format!("https://img.example/{}.png", self.id)),
            price: self.price,
            quantity,
            seller_id: self.seller_id.map(String::from),
        }
    }
}

/// A request seen by the fake cart service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
}

/// A canned failure for the next request.
#[derive(Debug, Clone)]
struct Failure {
    status: StatusCode,
    body: String,
    retry_after: Option<u64>,
}

#[derive(Default)]
struct ServiceState {
    catalog: HashMap<String, Product>,
    carts: HashMap<String, Vec<CartItemDto>>,
    failures: Vec<Failure>,
    requests: Vec<RecordedRequest>,
}

type Shared = Arc<Mutex<ServiceState>>;

fn lock(state: &Shared) -> std::sync::MutexGuard<'_, ServiceState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory cart service bound to an ephemeral port.
#[derive(Clone)]
pub struct FakeCartService {
    state: Shared,
    base_url: String,
}

impl FakeCartService {
    /// Start the service with the given catalog.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn spawn(catalog: &[Product]) -> Self {
        let state: Shared = Arc::new(Mutex::new(ServiceState {
            catalog: catalog
                .iter()
                .map(|p| (p.id.to_string(), p.clone()))
                .collect(),
            ..ServiceState::default()
        }));

        let app = Router::new()
            .route("/api/cart", get(get_cart).put(set_quantity))
            .route("/api/cart/add", post(add_item))
            .route("/api/cart/remove", delete(remove_item))
            .route("/api/cart/clear", delete(clear_cart))
            .layer(middleware::from_fn_with_state(state.clone(), record_and_fail))
            .with_state(state.clone());

        let addr = serve(app).await;
        Self {
            state,
            base_url: format!("http://{addr}/api"),
        }
    }

    /// Base URL including the `/api` prefix.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Answer the next request with `status` and `body` instead of a cart.
    pub fn fail_next(&self, status: StatusCode, body: &str) {
        lock(&self.state).failures.push(Failure {
            status,
            body: body.to_string(),
            retry_after: None,
        });
    }

    /// Answer the next request with 429 and a `Retry-After` header.
    pub fn rate_limit_next(&self, retry_after: u64) {
        lock(&self.state).failures.push(Failure {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: String::new(),
            retry_after: Some(retry_after),
        });
    }

    /// Answer the next request with a 200 whose body is not a cart.
    pub fn garble_next(&self) {
        lock(&self.state).failures.push(Failure {
            status: StatusCode::OK,
            body: "<html>maintenance</html>".to_string(),
            retry_after: None,
        });
    }

    /// Put a line directly into a user's server cart.
    ///
    /// # Panics
    ///
    /// Panics if the product is not in the catalog.
    pub fn seed(&self, user_id: &str, product_id: &str, quantity: i64) {
        let mut state = lock(&self.state);
        let line = state
            .catalog
            .get(product_id)
            .unwrap_or_else(|| panic!("unknown product {product_id}"))
            .line(quantity);
        let cart = state.carts.entry(user_id.to_string()).or_default();
        cart.retain(|item| item.product_id != product_id);
        cart.push(line);
    }

    /// Quantity of a product in a user's server cart, 0 when absent.
    #[must_use]
    pub fn quantity(&self, user_id: &str, product_id: &str) -> i64 {
        lock(&self.state)
            .carts
            .get(user_id)
            .and_then(|items| items.iter().find(|i| i.product_id == product_id))
            .map_or(0, |i| i.quantity)
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|e| panic!("failed to bind test listener: {e}"));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|e| panic!("listener has no address: {e}"));
    tokio::spawn(async move { axum::serve(listener, app).await });
    addr
}

// =============================================================================
// Fake service handlers
// =============================================================================

async fn record_and_fail(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let failure = {
        let mut state = lock(&state);
        state.requests.push(RecordedRequest {
            method: request.method().to_string(),
            path: request.uri().path().to_string(),
            authorization: request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(String::from),
        });
        (!state.failures.is_empty()).then(|| state.failures.remove(0))
    };

    match failure {
        Some(Failure {
            status,
            body,
            retry_after: Some(secs),
        }) => (status, [(header::RETRY_AFTER, secs.to_string())], body).into_response(),
        Some(Failure { status, body, .. }) => (status, body).into_response(),
        None => next.run(request).await,
    }
}

fn cart_of(state: &ServiceState, user_id: &str) -> CartDto {
    CartDto {
        user_id: user_id.to_string(),
        items: state.carts.get(user_id).cloned().unwrap_or_default(),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserQuery {
    user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineQuery {
    user_id: String,
    product_id: String,
}

async fn get_cart(State(state): State<Shared>, Query(query): Query<UserQuery>) -> Json<CartDto> {
    Json(cart_of(&lock(&state), &query.user_id))
}

async fn add_item(
    State(state): State<Shared>,
    Json(body): Json<CartLineRequest>,
) -> Result<Json<CartDto>, (StatusCode, String)> {
    let mut state = lock(&state);
    let product = state.catalog.get(&body.product_id).cloned().ok_or((
        StatusCode::INTERNAL_SERVER_ERROR,
        "Product not found".to_string(),
    ))?;

    let cart = state.carts.entry(body.user_id.clone()).or_default();
    match cart.iter_mut().find(|i| i.product_id == body.product_id) {
        Some(item) => item.quantity += body.quantity,
        None => cart.push(product.line(body.quantity)),
    }
    Ok(Json(cart_of(&state, &body.user_id)))
}

async fn set_quantity(
    State(state): State<Shared>,
    Json(body): Json<CartLineRequest>,
) -> Json<CartDto> {
    let mut state = lock(&state);
    let cart = state.carts.entry(body.user_id.clone()).or_default();
    if body.quantity <= 0 {
        cart.retain(|i| i.product_id != body.product_id);
    } else if let Some(item) = cart.iter_mut().find(|i| i.product_id == body.product_id) {
        item.quantity = body.quantity;
    }
    Json(cart_of(&state, &body.user_id))
}

async fn remove_item(State(state): State<Shared>, Query(query): Query<LineQuery>) -> Json<CartDto> {
    let mut state = lock(&state);
    if let Some(cart) = state.carts.get_mut(&query.user_id) {
        cart.retain(|i| i.product_id != query.product_id);
    }
    Json(cart_of(&state, &query.user_id))
}

async fn clear_cart(
    State(state): State<Shared>,
    Json(body): Json<ClearCartRequest>,
) -> Json<CartDto> {
    let mut state = lock(&state);
    state.carts.remove(&body.user_id);
    Json(cart_of(&state, &body.user_id))
}

// =============================================================================
// Storefront
// =============================================================================

/// Storefront configuration pointing at `cart_service_url`.
///
/// # Panics
///
/// Panics if `cart_service_url` is not a valid URL.
#[must_use]
pub fn storefront_config(cart_service_url: &str) -> StorefrontConfig {
    let mut config = StorefrontConfig::default();
    config.cart_service.base_url = Url::parse(cart_service_url)
        .unwrap_or_else(|e| panic!("invalid cart service URL {cart_service_url}: {e}"));
    config.cart_service.timeout = Duration::from_secs(2);
    config
}

/// Run the storefront on an ephemeral port and return its base URL.
///
/// # Panics
///
/// Panics if the application state cannot be built or no port can be bound.
pub async fn spawn_storefront(config: StorefrontConfig) -> String {
    let state = AppState::new(config)
        .unwrap_or_else(|e| panic!("failed to build storefront state: {e}"));
    let addr = serve(sellr_storefront::app(state)).await;
    format!("http://{addr}")
}

/// A URL on which nothing is listening.
///
/// # Panics
///
/// Panics if no local port can be bound.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|e| panic!("failed to bind test listener: {e}"));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|e| panic!("listener has no address: {e}"));
    drop(listener);
    format!("http://{addr}/api")
}

/// Catalog shared by the tests.
#[must_use]
pub fn catalog() -> Vec<Product> {
    vec![
        Product::new("A", "Enamel Mug", 1000),
        Product::new("B", "Tea Towel", 500),
        Product {
            seller_id: Some("seller-7"),
            ..Product::new("C", "Postcard", 250)
        },
    ]
}
