//! Sellr storefront library.
//!
//! Keeps a per-session cart cache in sync with the Sellr cart service and
//! serves it over a small JSON API. The binary in `main.rs` only adds
//! process setup (tracing, Sentry, signals) around [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;

use std::time::Duration;

use axum::{
    Router,
    http::{Request, Response},
    routing::get,
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use state::AppState;

/// Build the storefront router with its session, request ID and trace layers.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .merge(routes::routes())
        .layer(session_layer)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(|response: &Response<_>, latency: Duration, span: &Span| {
                    span.record("status", response.status().as_u16());
                    span.record(
                        "latency_ms",
                        u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                    );
                    DefaultOnResponse::default().on_response(response, latency, span);
                }),
        )
        .with_state(state)
}

/// Liveness check. Does not contact the cart service.
async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{body::Body, http::StatusCode};
    use tower::ServiceExt;

    use sellr_core::{Cart, ProductId, UserId};

    use super::*;
    use crate::api::{ApiError, CartApi};
    use crate::config::StorefrontConfig;

    /// Cart service that is always down.
    struct Down;

    fn down() -> ApiError {
        ApiError::Status {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            message: "down".to_string(),
        }
    }

    #[async_trait]
    impl CartApi for Down {
        async fn get_cart(&self, _: &UserId) -> Result<Cart, ApiError> {
            Err(down())
        }
        async fn add_item(&self, _: &UserId, _: &ProductId, _: u32) -> Result<Cart, ApiError> {
            Err(down())
        }
        async fn set_quantity(&self, _: &UserId, _: &ProductId, _: i64) -> Result<Cart, ApiError> {
            Err(down())
        }
        async fn remove_item(&self, _: &UserId, _: &ProductId) -> Result<Cart, ApiError> {
            Err(down())
        }
        async fn clear_cart(&self, _: &UserId) -> Result<Cart, ApiError> {
            Err(down())
        }
    }

    fn router() -> Router {
        app(AppState::with_api(StorefrontConfig::default(), Arc::new(Down)))
    }

    #[tokio::test]
    async fn test_health_does_not_need_cart_service() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cart_without_session_is_unauthorized() {
        let response = router()
            .oneshot(Request::get("/cart").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let response = router()
            .oneshot(Request::get("/checkout").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_adopt_identity_sets_session_cookie() {
        let response = router()
            .oneshot(
                Request::post("/session")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"userId":"u1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap();
        assert!(cookie.starts_with("sellr_session="));
    }
}
