//! Session-related types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sellr_core::UserId;

/// Session-stored user identity.
///
/// The identity is issued by an external authentication flow; the
/// storefront only adopts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User whose cart this session shows.
    pub user_id: UserId,
    /// Key of this session's cart store and snapshot.
    pub cart_key: String,
}

impl CurrentUser {
    /// Adopt an identity with a fresh cart key.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            cart_key: Uuid::new_v4().to_string(),
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current user.
    pub const CURRENT_USER: &str = "current_user";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_each_login_gets_its_own_cart_key() {
        let user_id = UserId::parse("u1").unwrap();
        let first = CurrentUser::new(user_id.clone());
        let second = CurrentUser::new(user_id);
        assert_ne!(first.cart_key, second.cart_key);
    }

    #[test]
    fn test_session_json_shape() {
        let user = CurrentUser {
            user_id: UserId::parse("u1").unwrap(),
            cart_key: "k".to_string(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json, serde_json::json!({"user_id": "u1", "cart_key": "k"}));
    }
}
