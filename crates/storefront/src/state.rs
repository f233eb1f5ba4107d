//! Application state shared across handlers.

use std::sync::Arc;

use crate::api::{ApiError, CartApi, HttpCartApi};
use crate::cart::CartRegistry;
use crate::config::StorefrontConfig;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    carts: CartRegistry,
}

impl AppState {
    /// Create state backed by the HTTP cart service client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, ApiError> {
        let api = HttpCartApi::new(&config.cart_service)?;
        Ok(Self::with_api(config, Arc::new(api)))
    }

    /// Create state over any cart service implementation.
    #[must_use]
    pub fn with_api(config: StorefrontConfig, api: Arc<dyn CartApi>) -> Self {
        let carts = CartRegistry::new(api, config.cart_idle_timeout);
        Self {
            inner: Arc::new(AppStateInner { config, carts }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Per-session cart stores.
    #[must_use]
    pub fn carts(&self) -> &CartRegistry {
        &self.inner.carts
    }
}
