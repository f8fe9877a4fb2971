//! Key-value persistence for the cart.
//!
//! The cart is stored as one string entry holding a JSON array of cart items,
//! the same shape a browser's local storage would hold. Backends only deal in
//! strings; [`load_cart`] and [`save_cart`] do the JSON encoding.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use rocketshoes_core::Cart;
use thiserror::Error;
use tracing::debug;

/// Default storage key for the cart entry.
pub const DEFAULT_CART_KEY: &str = "@RocketShoes:cart";

/// Errors that can occur when reading or writing persisted state.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Persisted data exists but is not usable.
    #[error("Corrupt data: {0}")]
    Corrupt(String),
}

/// A string key-value store.
#[async_trait]
pub trait CartStorage: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Delete the value under `key`. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Load the cart persisted under `key`.
///
/// A missing entry is an empty cart.
///
/// # Errors
///
/// Returns [`StorageError::Corrupt`] if the entry is not a valid cart, or the
/// backend's error if reading fails.
pub async fn load_cart(storage: &dyn CartStorage, key: &str) -> Result<Cart, StorageError> {
    let Some(raw) = storage.get(key).await? else {
        debug!(key, "No persisted cart, starting empty");
        return Ok(Cart::new());
    };

    serde_json::from_str(&raw)
        .map_err(|e| StorageError::Corrupt(format!("cart entry {key} is not a valid cart: {e}")))
}

/// Persist `cart` under `key`.
///
/// # Errors
///
/// Returns the backend's error if writing fails.
pub async fn save_cart(storage: &dyn CartStorage, key: &str, cart: &Cart) -> Result<(), StorageError> {
    let raw = serde_json::to_string(cart)?;
    storage.set(key, raw).await
}
