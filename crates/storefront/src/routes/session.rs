//! Session identity routes.
//!
//! Identities are issued by an external auth flow. The storefront adopts
//! one per browser session and tears the session's cart down on logout.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use sellr_core::UserId;

use super::cart::CartView;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalUser, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Adopt-identity request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdoptRequest {
    pub user_id: String,
}

/// Adopt a user identity for this browser session and load their cart.
///
/// A previously adopted identity is logged out first.
#[instrument(skip_all, fields(user_id = %request.user_id))]
pub async fn adopt(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(previous): OptionalUser,
    Json(request): Json<AdoptRequest>,
) -> Result<Json<CartView>> {
    let user_id = UserId::parse(&request.user_id).map_err(|e| AppError::BadRequest(e.to_string()))?;

    if let Some(previous) = previous {
        end_cart_session(&state, &previous).await;
    }

    session.cycle_id().await?;
    let user = CurrentUser::new(user_id);
    set_current_user(&session, &user).await?;
    set_sentry_user(&user.user_id);
    info!("Session identity adopted");

    let store = state.carts().store_for(&user.cart_key).await;
    let view = match store.fetch(&user.user_id).await {
        Ok(items) => CartView::from(&items),
        Err(e) => {
            warn!(error = %e, "Initial cart fetch failed");
            CartView::from(&store.items().await).stale()
        }
    };
    Ok(Json(view))
}

/// Clear the cart cache and the session identity.
///
/// The server-side cart is kept.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
) -> Result<StatusCode> {
    if let Some(user) = user {
        end_cart_session(&state, &user).await;
    }

    clear_current_user(&session).await?;
    session.flush().await?;
    clear_sentry_user();

    Ok(StatusCode::NO_CONTENT)
}

/// Clear and drop a session's cart store. In-flight operations are cancelled.
async fn end_cart_session(state: &AppState, user: &CurrentUser) {
    let store = state.carts().store_for(&user.cart_key).await;
    if let Err(e) = store.clear().await {
        warn!(error = %e, "Failed to clear cart on logout");
    }
    state.carts().forget(&user.cart_key).await;
}
