//! Remote collaborators of the cart: stock levels and catalog metadata.
//!
//! # Architecture
//!
//! - The store only sees the [`StockService`] and [`CatalogService`] ports
//! - [`ApiClient`] implements both against the storefront REST API
//! - Catalog lookups are cached in-memory via `moka`; stock is always live
//!
//! # Example
//!
//! ```rust,ignore
//! use rocketshoes_cart::services::{ApiClient, StockService};
//!
//! let client = ApiClient::new(&config.api)?;
//! let stock = client.stock(ProductId::new(1)).await?;
//! ```

mod api;

pub use api::ApiClient;

use async_trait::async_trait;
use rocketshoes_core::{Product, ProductId, StockInfo};
use thiserror::Error;

/// Errors that can occur when talking to the stock or catalog service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// API returned a non-success response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Source of live stock levels.
#[async_trait]
pub trait StockService: Send + Sync {
    /// Available quantity for a product.
    async fn stock(&self, id: ProductId) -> Result<StockInfo, ServiceError>;
}

/// Source of product metadata.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Product metadata for a product id.
    async fn product(&self, id: ProductId) -> Result<Product, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_display() {
        let err = ServiceError::NotFound("products/9".to_string());
        assert_eq!(err.to_string(), "Not found: products/9");

        let err = ServiceError::Api {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 503 - unavailable");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = ServiceError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
    }
}
