//! Cart store error taxonomy.

use thiserror::Error;

use sellr_core::IdError;

use super::snapshot::SnapshotError;
use crate::api::ApiError;

/// Errors returned by cart store operations.
///
/// None of these are fatal: the cache keeps its last known good state and
/// the caller decides what to show the user.
#[derive(Debug, Error)]
pub enum CartError {
    /// The request did not reach the cart service.
    #[error("Network error: {0}")]
    Network(String),

    /// The cart service answered with a non-success status.
    #[error("Cart service error (HTTP {status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response detail.
        message: String,
    },

    /// The cart service answered with something that is not a valid cart.
    #[error("Invalid cart response: {0}")]
    Decode(String),

    /// The operation was rejected locally; no request was sent.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Reading or writing the session snapshot failed.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The store was cleared or detached while the request was in flight.
    #[error("Cart operation cancelled")]
    Cancelled,
}

impl CartError {
    /// Whether this error came from the cart service or the network.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. } | Self::Decode(_))
    }
}

impl From<ApiError> for CartError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Http(e) => Self::Network(e.to_string()),
            ApiError::Status { status, message } => Self::Server {
                status: status.as_u16(),
                message,
            },
            ApiError::RateLimited(retry_after) => Self::Server {
                status: 429,
                message: format!("rate limited, retry after {retry_after} seconds"),
            },
            ApiError::Parse(e) => Self::Decode(e.to_string()),
            ApiError::InvalidCart(message) => Self::Decode(message),
        }
    }
}

impl From<IdError> for CartError {
    fn from(err: IdError) -> Self {
        Self::Precondition(err.to_string())
    }
}
