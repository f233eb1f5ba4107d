//! Wire types for the cart service and their conversion into core types.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use sellr_core::{Cart, CartItem, CartItems, Price, ProductId, SellerId, UserId};

use super::ApiError;

/// Cart as sent by the cart service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartDto {
    pub user_id: String,
    #[serde(default)]
    pub items: Vec<CartItemDto>,
}

/// Cart line as sent by the cart service.
///
/// Prices travel as JSON numbers; quantities are signed on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemDto {
    pub product_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller_id: Option<String>,
}

/// Body of `POST /cart/add` and `PUT /cart`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineRequest {
    pub user_id: String,
    pub product_id: String,
    pub quantity: i64,
}

/// Body of `DELETE /cart/clear`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearCartRequest {
    pub user_id: String,
}

impl CartDto {
    /// Convert into a [`Cart`], dropping lines that break cart invariants.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidCart` if the user ID is blank.
    pub fn into_cart(self) -> Result<Cart, ApiError> {
        let user_id = UserId::parse(&self.user_id)
            .map_err(|e| ApiError::InvalidCart(e.to_string()))?;

        let mut seen = HashSet::new();
        let items: Vec<CartItem> = self
            .items
            .into_iter()
            .filter_map(convert_item)
            .filter(|item| {
                let first = seen.insert(item.product_id.clone());
                if !first {
                    warn!(product_id = %item.product_id, "Dropping duplicate cart line");
                }
                first
            })
            .collect();

        let items = CartItems::new(items).map_err(|e| ApiError::InvalidCart(e.to_string()))?;
        Ok(Cart { user_id, items })
    }
}

fn convert_item(dto: CartItemDto) -> Option<CartItem> {
    let product_id = match ProductId::parse(&dto.product_id) {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "Dropping cart line with invalid product ID");
            return None;
        }
    };

    let quantity = match u32::try_from(dto.quantity) {
        Ok(q) if q > 0 => q,
        _ => {
            warn!(
                product_id = %product_id,
                quantity = dto.quantity,
                "Dropping cart line with non-positive quantity"
            );
            return None;
        }
    };

    Some(CartItem {
        product_id,
        name: dto.name.unwrap_or_default(),
        price: Price::new(dto.price),
        image_url: dto.image_url.filter(|url| !url.is_empty()),
        quantity,
        seller_id: dto.seller_id.and_then(|s| SellerId::parse(&s).ok()),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Cart {
        serde_json::from_str::<CartDto>(json)
            .unwrap()
            .into_cart()
            .unwrap()
    }

    #[test]
    fn test_parses_backend_cart() {
        let cart = parse(
            r#"{
                "userId": "u1",
                "items": [
                    {"productId": "A", "name": "Mug", "imageUrl": "http://img/a.png",
                     "price": 10.5, "quantity": 2, "sellerId": "s1"}
                ]
            }"#,
        );
        assert_eq!(cart.user_id.as_str(), "u1");
        let item = cart.items.iter().next().unwrap();
        assert_eq!(item.name, "Mug");
        assert_eq!(item.price, Price::from_cents(1050));
        assert_eq!(item.quantity, 2);
        assert_eq!(item.seller_id.as_ref().unwrap().as_str(), "s1");
    }

    #[test]
    fn test_missing_items_is_empty_cart() {
        let cart = parse(r#"{"userId": "u1"}"#);
        assert!(cart.items.is_empty());
    }

    #[test]
    fn test_drops_non_positive_quantities() {
        let cart = parse(
            r#"{"userId": "u1", "items": [
                {"productId": "A", "name": "A", "price": 1, "quantity": 0},
                {"productId": "B", "name": "B", "price": 1, "quantity": -3},
                {"productId": "C", "name": "C", "price": 1, "quantity": 1}
            ]}"#,
        );
        assert_eq!(cart.items.len(), 1);
        assert!(cart.items.contains(&ProductId::parse("C").unwrap()));
    }

    #[test]
    fn test_drops_duplicate_products_keeping_first() {
        let cart = parse(
            r#"{"userId": "u1", "items": [
                {"productId": "A", "name": "A", "price": 1, "quantity": 2},
                {"productId": "A", "name": "A", "price": 1, "quantity": 5}
            ]}"#,
        );
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items.quantity_of(&ProductId::parse("A").unwrap()), 2);
    }

    #[test]
    fn test_blank_user_is_invalid() {
        let dto: CartDto = serde_json::from_str(r#"{"userId": "", "items": []}"#).unwrap();
        assert!(matches!(dto.into_cart(), Err(ApiError::InvalidCart(_))));
    }

    #[test]
    fn test_request_body_field_names() {
        let body = CartLineRequest {
            user_id: "u1".to_string(),
            product_id: "A".to_string(),
            quantity: 3,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"userId": "u1", "productId": "A", "quantity": 3})
        );
    }
}
