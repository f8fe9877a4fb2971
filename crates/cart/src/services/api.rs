//! Storefront REST API client.
//!
//! Uses `reqwest` for HTTP. Products are cached using `moka` with the TTL
//! from [`ApiConfig`]; stock levels are never cached because they back the
//! stock-limit check.

use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use rocketshoes_core::{Product, ProductId, StockInfo};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::{CatalogService, ServiceError, StockService};
use crate::config::ApiConfig;

const MAX_CACHED_PRODUCTS: u64 = 1000;

/// Client for the storefront stock and product endpoints.
///
/// Cheaply cloneable; clones share the HTTP connection pool and product cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    endpoint: String,
    products: Cache<ProductId, Product>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns error if the token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &ApiConfig) -> Result<Self, ServiceError> {
        let mut headers = HeaderMap::new();

        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| ServiceError::Parse(format!("Invalid API token format: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        let products = Cache::builder()
            .max_capacity(MAX_CACHED_PRODUCTS)
            .time_to_live(config.catalog_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                endpoint: config.base_url.as_str().trim_end_matches('/').to_string(),
                products,
            }),
        })
    }

    /// GET a JSON resource relative to the API base URL.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let url = format!("{}/{path}", self.inner.endpoint);
        let response = self.inner.client.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(path.to_string()));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ServiceError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Storefront API returned non-success status"
            );
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse storefront API response"
            );
            ServiceError::Parse(e.to_string())
        })
    }
}

#[async_trait]
impl StockService for ApiClient {
    #[instrument(skip(self), fields(product_id = %id))]
    async fn stock(&self, id: ProductId) -> Result<StockInfo, ServiceError> {
        let stock: StockInfo = self.get_json(&format!("stock/{id}")).await?;
        debug!(available = stock.amount, "Fetched stock level");
        Ok(stock)
    }
}

#[async_trait]
impl CatalogService for ApiClient {
    #[instrument(skip(self), fields(product_id = %id))]
    async fn product(&self, id: ProductId) -> Result<Product, ServiceError> {
        if let Some(product) = self.inner.products.get(&id).await {
            debug!("Product cache hit");
            return Ok(product);
        }

        let product: Product = self.get_json(&format!("products/{id}")).await?;
        self.inner.products.insert(id, product.clone()).await;
        Ok(product)
    }
}
