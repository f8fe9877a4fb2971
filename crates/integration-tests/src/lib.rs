//! Integration tests for RocketShoes.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p rocketshoes-integration-tests
//! ```
//!
//! No external services are needed: [`MockStorefront`] serves the stock and
//! product endpoints from a local `wiremock` server, and carts are persisted
//! to a temporary directory.

use std::path::Path;
use std::sync::Arc;

use rocketshoes_cart::{ApiClient, CartConfig, CartStore, FileStorage};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Catalog fixture: `(id, title, price, stock)`.
pub const PRODUCTS: &[(u32, &str, f64, u32)] = &[
    (1, "Tênis de Caminhada Leve Confortável", 179.9, 3),
    (2, "Tênis VR Caminhada Confortável Detalhes Couro Masculino", 139.9, 5),
    (3, "Tênis Adidas Duramo Lite 2.0", 219.9, 2),
    (4, "Tênis VR Caminhada Confortável Detalhes Couro Masculino", 139.9, 1),
    (5, "Tênis VR Caminhada Confortável Detalhes Couro Masculino", 139.9, 5),
    (6, "Tênis Adidas Duramo Lite 2.0", 219.9, 10),
];

/// A local storefront API serving [`PRODUCTS`].
///
/// Unknown ids answer 404 with an empty object.
pub struct MockStorefront {
    server: MockServer,
}

impl MockStorefront {
    /// Start the server and mount the fixture routes.
    pub async fn start() -> Self {
        let server = MockServer::start().await;

        for &(id, title, price, stock) in PRODUCTS {
            Mock::given(method("GET"))
                .and(path(format!("/products/{id}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "id": id,
                    "title": title,
                    "price": price,
                    "image": format!("https://rocketseat-cdn.s3-sa-east-1.amazonaws.com/modulo-redux/tenis{id}.jpg"),
                })))
                .mount(&server)
                .await;

            Mock::given(method("GET"))
                .and(path(format!("/stock/{id}")))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({ "id": id, "amount": stock })),
                )
                .mount(&server)
                .await;
        }

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({})))
            .with_priority(u8::MAX)
            .mount(&server)
            .await;

        Self { server }
    }

    /// Base URL of the server.
    #[must_use]
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Number of requests received for `request_path`.
    pub async fn hits(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == request_path)
            .count()
    }

    /// Configuration pointing at this server and a storage file under `dir`.
    ///
    /// # Panics
    ///
    /// Panics if the generated configuration is rejected.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn config(&self, dir: &Path) -> CartConfig {
        let uri = self.uri();
        let storage_path = dir.join("storage.json").display().to_string();
        CartConfig::from_lookup(|key| match key {
            "ROCKETSHOES_API_URL" => Some(uri.clone()),
            "ROCKETSHOES_STORAGE_PATH" => Some(storage_path.clone()),
            _ => None,
        })
        .unwrap()
    }
}

/// Everything a test session needs.
pub struct Session {
    pub storefront: MockStorefront,
    pub dir: TempDir,
    pub config: CartConfig,
}

impl Session {
    /// Start a storefront and an empty storage directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[allow(clippy::unwrap_used)]
    pub async fn start() -> Self {
        let storefront = MockStorefront::start().await;
        let dir = tempfile::tempdir().unwrap();
        let config = storefront.config(dir.path());
        Self {
            storefront,
            dir,
            config,
        }
    }

    /// Open a cart store on this session's storage file, as a fresh app start would.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built or the cart cannot be loaded.
    #[allow(clippy::unwrap_used)]
    pub async fn open_store(&self) -> CartStore {
        let client = Arc::new(ApiClient::new(&self.config.api).unwrap());
        let storage = Arc::new(FileStorage::new(&self.config.storage_path));
        CartStore::open(&self.config.cart_key, storage, client.clone(), client)
            .await
            .unwrap()
    }
}
