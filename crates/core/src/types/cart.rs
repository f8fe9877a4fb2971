//! Cart line items and the cart collection.
//!
//! [`Cart`] is immutable from the outside: every change produces a new cart
//! through [`Cart::with_item`] or [`Cart::without`], so a caller can compute a
//! mutation in full before deciding to apply it.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// Errors raised when a list of items does not form a valid cart.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartValidationError {
    /// Two lines share the same product id.
    #[error("duplicate cart line for product {0}")]
    DuplicateProduct(ProductId),
    /// A line has an amount of zero.
    #[error("cart line for product {0} has a zero amount")]
    ZeroAmount(ProductId),
}

/// A product in the cart together with the requested amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: ProductId,
    #[serde(alias = "name")]
    pub title: String,
    pub price: Price,
    pub image: String,
    /// Requested quantity, always at least 1 inside a [`Cart`].
    pub amount: u32,
}

impl CartItem {
    /// The same line with a different amount.
    #[must_use]
    pub fn with_amount(self, amount: u32) -> Self {
        Self { amount, ..self }
    }

    /// Unit price times amount.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.amount)
    }
}

/// An ordered collection of cart lines, at most one per product.
///
/// Order is insertion order; replacing a line moves it to the end.
///
/// Serializes as a bare JSON array of [`CartItem`]. Deserialization rejects
/// duplicate products and zero amounts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<CartItem>", into = "Vec<CartItem>")]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from a list of lines.
    ///
    /// # Errors
    ///
    /// Returns an error if two lines share a product id or a line has a zero
    /// amount.
    pub fn from_items(items: Vec<CartItem>) -> Result<Self, CartValidationError> {
        for (index, item) in items.iter().enumerate() {
            if item.amount == 0 {
                return Err(CartValidationError::ZeroAmount(item.id));
            }
            if items.iter().skip(index + 1).any(|other| other.id == item.id) {
                return Err(CartValidationError::DuplicateProduct(item.id));
            }
        }
        Ok(Self { items })
    }

    /// The cart lines in order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Iterate over the cart lines.
    pub fn iter(&self) -> std::slice::Iter<'_, CartItem> {
        self.items.iter()
    }

    /// Look up the line for a product.
    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Returns true if the cart has a line for this product.
    #[must_use]
    pub fn contains(&self, id: ProductId) -> bool {
        self.get(id).is_some()
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of all line amounts.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.amount)).sum()
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// A new cart with `item` replacing any line for the same product.
    ///
    /// The line lands at the end of the cart either way. An item with a zero
    /// amount is not a valid line, so it drops the product instead.
    #[must_use]
    pub fn with_item(&self, item: CartItem) -> Self {
        let mut cart = self.without(item.id);
        if item.amount > 0 {
            cart.items.push(item);
        }
        cart
    }

    /// A new cart without the line for `id`.
    #[must_use]
    pub fn without(&self, id: ProductId) -> Self {
        Self {
            items: self
                .items
                .iter()
                .filter(|item| item.id != id)
                .cloned()
                .collect(),
        }
    }
}

impl TryFrom<Vec<CartItem>> for Cart {
    type Error = CartValidationError;

    fn try_from(items: Vec<CartItem>) -> Result<Self, Self::Error> {
        Self::from_items(items)
    }
}

impl From<Cart> for Vec<CartItem> {
    fn from(cart: Cart) -> Self {
        cart.items
    }
}

impl<'a> IntoIterator for &'a Cart {
    type Item = &'a CartItem;
    type IntoIter = std::slice::Iter<'a, CartItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
