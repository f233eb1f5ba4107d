//! `reqwest` implementation of [`CartApi`].

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use sellr_core::{Cart, ProductId, UserId};

use super::types::{CartDto, CartLineRequest, ClearCartRequest};
use super::{ApiError, CartApi};
use crate::config::CartServiceConfig;

/// Longest slice of a response body kept in logs and errors.
const MAX_LOGGED_BODY: usize = 500;

/// Client for the cart service REST API.
#[derive(Clone)]
pub struct HttpCartApi {
    inner: Arc<HttpCartApiInner>,
}

struct HttpCartApiInner {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
}

impl HttpCartApi {
    /// Create a new cart service client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (TLS backend
    /// initialization failure).
    pub fn new(config: &CartServiceConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpCartApiInner {
                client,
                base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
                token: config.token.clone(),
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    /// Send a request and decode the cart in the response.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Cart, ApiError> {
        let request = match &self.inner.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        // Read the body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %truncate(&response_text),
                "Cart service returned non-success status"
            );
            return Err(ApiError::Status {
                status,
                message: truncate(&response_text),
            });
        }

        let dto: CartDto = match serde_json::from_str(&response_text) {
            Ok(dto) => dto,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %truncate(&response_text),
                    "Failed to parse cart service response"
                );
                return Err(ApiError::Parse(e));
            }
        };

        dto.into_cart()
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_LOGGED_BODY).collect()
}

#[async_trait]
impl CartApi for HttpCartApi {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn get_cart(&self, user_id: &UserId) -> Result<Cart, ApiError> {
        let request = self
            .inner
            .client
            .get(self.url("/cart"))
            .query(&[("userId", user_id.as_str())]);
        self.execute(request).await
    }

    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    async fn add_item(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Cart, ApiError> {
        let body = CartLineRequest {
            user_id: user_id.to_string(),
            product_id: product_id.to_string(),
            quantity: i64::from(quantity),
        };
        let request = self.inner.client.post(self.url("/cart/add")).json(&body);
        self.execute(request).await
    }

    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    async fn set_quantity(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<Cart, ApiError> {
        let body = CartLineRequest {
            user_id: user_id.to_string(),
            product_id: product_id.to_string(),
            quantity,
        };
        let request = self.inner.client.put(self.url("/cart")).json(&body);
        self.execute(request).await
    }

    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    async fn remove_item(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<Cart, ApiError> {
        let request = self
            .inner
            .client
            .delete(self.url("/cart/remove"))
            .query(&[
                ("userId", user_id.as_str()),
                ("productId", product_id.as_str()),
            ]);
        self.execute(request).await
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn clear_cart(&self, user_id: &UserId) -> Result<Cart, ApiError> {
        let body = ClearCartRequest {
            user_id: user_id.to_string(),
        };
        let request = self.inner.client.delete(self.url("/cart/clear")).json(&body);
        self.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_limits_length() {
        let body = "x".repeat(MAX_LOGGED_BODY * 2);
        assert_eq!(truncate(&body).len(), MAX_LOGGED_BODY);
        assert_eq!(truncate("short"), "short");
    }
}
