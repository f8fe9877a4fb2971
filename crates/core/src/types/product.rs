//! Catalog and stock records as served by the storefront API.

use serde::{Deserialize, Serialize};

use super::cart::CartItem;
use super::id::ProductId;
use super::price::Price;

/// Product metadata from the catalog service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Display name of the product.
    #[serde(alias = "name")]
    pub title: String,
    pub price: Price,
    /// Image URL.
    pub image: String,
}

impl Product {
    /// Turn this product into a cart line with the given amount.
    #[must_use]
    pub fn into_cart_item(self, amount: u32) -> CartItem {
        CartItem {
            id: self.id,
            title: self.title,
            price: self.price,
            image: self.image,
            amount,
        }
    }
}

/// Available quantity for a product, as reported by the stock service.
///
/// Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockInfo {
    pub id: ProductId,
    pub amount: u32,
}

impl StockInfo {
    /// Returns true if `requested` units cannot be served from this stock.
    #[must_use]
    pub fn is_exceeded_by(&self, requested: u64) -> bool {
        requested > u64::from(self.amount)
    }
}
