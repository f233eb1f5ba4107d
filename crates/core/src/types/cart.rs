//! Cart line items and the ordered item sequence.
//!
//! [`CartItems`] upholds two invariants on construction and deserialization:
//! every quantity is at least 1, and a product appears at most once.

use serde::{Deserialize, Serialize};

use super::id::{ProductId, SellerId, UserId};
use super::price::Price;

/// Errors that can occur when building a [`CartItems`] sequence.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartItemsError {
    /// An item has a quantity of zero.
    #[error("cart item {0} has zero quantity")]
    ZeroQuantity(ProductId),
    /// The same product appears twice.
    #[error("product {0} appears more than once in the cart")]
    DuplicateProduct(ProductId),
}

/// Display fields of a product, as needed to put it in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub image_url: Option<String>,
    #[serde(default)]
    pub seller_id: Option<SellerId>,
}

/// A single line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub image_url: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub seller_id: Option<SellerId>,
}

impl CartItem {
    /// Create a line for `product` with the given quantity.
    #[must_use]
    pub fn from_product(product: ProductSummary, quantity: u32) -> Self {
        Self {
            product_id: product.product_id,
            name: product.name,
            price: product.price,
            image_url: product.image_url,
            quantity,
            seller_id: product.seller_id,
        }
    }

    /// Price of this line (unit price times quantity).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// Ordered cart contents with unique products and positive quantities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CartItem>", into = "Vec<CartItem>")]
pub struct CartItems(Vec<CartItem>);

impl CartItems {
    /// An empty cart.
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build a sequence, checking quantity and uniqueness invariants.
    ///
    /// # Errors
    ///
    /// Returns an error if any item has zero quantity or a product repeats.
    pub fn new(items: Vec<CartItem>) -> Result<Self, CartItemsError> {
        for (i, item) in items.iter().enumerate() {
            if item.quantity == 0 {
                return Err(CartItemsError::ZeroQuantity(item.product_id.clone()));
            }
            if items
                .iter()
                .take(i)
                .any(|earlier| earlier.product_id == item.product_id)
            {
                return Err(CartItemsError::DuplicateProduct(item.product_id.clone()));
            }
        }
        Ok(Self(items))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CartItem> {
        self.0.iter()
    }

    /// Find the line for a product.
    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.0.iter().find(|item| &item.product_id == product_id)
    }

    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.get(product_id).is_some()
    }

    /// Quantity of a product in the cart, 0 when absent.
    #[must_use]
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.get(product_id).map_or(0, |item| item.quantity)
    }

    /// Sum of all quantities, saturating at `u32::MAX`.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.0
            .iter()
            .fold(0, |total: u32, item| total.saturating_add(item.quantity))
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.0.iter().map(CartItem::line_total).sum()
    }
}

/// A user's cart as returned by the cart service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub user_id: UserId,
    pub items: CartItems,
}

impl Cart {
    /// An empty cart for a user.
    #[must_use]
    pub const fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            items: CartItems::empty(),
        }
    }
}

impl TryFrom<Vec<CartItem>> for CartItems {
    type Error = CartItemsError;

    fn try_from(items: Vec<CartItem>) -> Result<Self, Self::Error> {
        Self::new(items)
    }
}

impl From<CartItems> for Vec<CartItem> {
    fn from(items: CartItems) -> Self {
        items.0
    }
}

impl<'a> IntoIterator for &'a CartItems {
    type Item = &'a CartItem;
    type IntoIter = std::slice::Iter<'a, CartItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(id: &str, cents: i64, quantity: u32) -> CartItem {
        CartItem {
            product_id: ProductId::parse(id).unwrap(),
            name: format!("Product {id}"),
            price: Price::from_cents(cents),
            image_url: None,
            quantity,
            seller_id: None,
        }
    }

    #[test]
    fn test_new_rejects_zero_quantity() {
        let err = CartItems::new(vec![item("A", 100, 0)]).unwrap_err();
        assert!(matches!(err, CartItemsError::ZeroQuantity(_)));
    }

    #[test]
    fn test_new_rejects_duplicates() {
        let err = CartItems::new(vec![item("A", 100, 1), item("A", 100, 2)]).unwrap_err();
        assert_eq!(
            err,
            CartItemsError::DuplicateProduct(ProductId::parse("A").unwrap())
        );
    }

    #[test]
    fn test_subtotal_and_total_quantity() {
        let items = CartItems::new(vec![item("A", 1000, 2), item("B", 500, 1)]).unwrap();
        assert_eq!(items.subtotal(), Price::from_cents(2500));
        assert_eq!(items.total_quantity(), 3);
    }

    #[test]
    fn test_huge_quantities_saturate() {
        let items = CartItems::new(vec![
            item("A", 1000, 2_000_000_000),
            item("B", 500, 2_000_000_000),
            item("C", 250, 2_000_000_000),
        ])
        .unwrap();

        assert_eq!(items.total_quantity(), u32::MAX);
        assert_eq!(items.subtotal(), Price::from_cents(3_500_000_000_000));
    }

    #[test]
    fn test_quantity_of_absent_is_zero() {
        let items = CartItems::new(vec![item("A", 1000, 2)]).unwrap();
        assert_eq!(items.quantity_of(&ProductId::parse("A").unwrap()), 2);
        assert_eq!(items.quantity_of(&ProductId::parse("Z").unwrap()), 0);
    }

    #[test]
    fn test_order_is_preserved() {
        let items = CartItems::new(vec![item("B", 1, 1), item("A", 1, 1)]).unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(ids, ["B", "A"]);
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"[{"productId":"A","name":"A","price":"1.00","imageUrl":null,"quantity":0}]"#;
        assert!(serde_json::from_str::<CartItems>(json).is_err());

        let json = r#"[{"productId":"A","name":"A","price":"1.00","imageUrl":null,"quantity":3}]"#;
        let items: CartItems = serde_json::from_str(json).unwrap();
        assert_eq!(items.total_quantity(), 3);
        assert_eq!(items.subtotal(), Price::from_cents(300));
    }
}
