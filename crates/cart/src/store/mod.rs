//! The cart store.
//!
//! [`CartStore`] holds the session's cart in memory, mirrors it to a
//! [`CartStorage`] after every change, and validates requested amounts
//! against the [`StockService`].
//!
//! # Consistency
//!
//! - Mutations are serialized by a whole-cart async lock held from reading
//!   the current cart until the new cart is installed, so two quick `add`
//!   calls for the same product always end at amount + 2
//! - The new cart is persisted before it replaces the in-memory cart; if the
//!   write fails the in-memory cart is untouched
//! - Reads never wait for an in-flight mutation
//!
//! # Example
//!
//! ```rust,ignore
//! let client = Arc::new(ApiClient::new(&config.api)?);
//! let storage = Arc::new(FileStorage::new(&config.storage_path));
//! let store = CartStore::open(&config.cart_key, storage, client.clone(), client).await?;
//!
//! store.add(ProductId::new(1)).await?;
//! store.set_amount(ProductId::new(1), 3).await?;
//! store.remove(ProductId::new(1)).await?;
//! ```

mod events;

pub use events::{CartChange, CartEvent, SubscriptionId};

use std::sync::{Arc, PoisonError, RwLock};

use rocketshoes_core::{Cart, CartItem, ProductId};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{CartError, Result};
use crate::services::{CatalogService, StockService};
use crate::storage::{self, CartStorage};

use events::Subscribers;

/// Outcome of [`CartStore::set_amount`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountUpdate {
    /// The line now has the requested amount.
    Updated(CartItem),
    /// Nothing happened; not an error.
    Ignored(IgnoreReason),
}

/// Why a `set_amount` call did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The requested amount was zero or negative.
    NonPositiveAmount,
    /// The product has no line in the cart.
    NotInCart,
}

#[derive(Debug)]
struct Snapshot {
    cart: Cart,
    version: u64,
}

/// Session cart with stock validation and persistence.
///
/// Cheaply cloneable via `Arc`; clones share the same cart.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    key: String,
    storage: Arc<dyn CartStorage>,
    stock: Arc<dyn StockService>,
    catalog: Arc<dyn CatalogService>,
    snapshot: RwLock<Snapshot>,
    mutation: Mutex<()>,
    subscribers: Subscribers,
}

impl CartStore {
    /// Open the cart persisted under `key`.
    ///
    /// A missing entry starts an empty cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Storage`] if the entry cannot be read or is not a
    /// valid cart.
    #[instrument(skip_all)]
    pub async fn open(
        key: impl AsRef<str>,
        storage: Arc<dyn CartStorage>,
        stock: Arc<dyn StockService>,
        catalog: Arc<dyn CatalogService>,
    ) -> Result<Self> {
        let key = key.as_ref().to_string();
        let cart = storage::load_cart(storage.as_ref(), &key).await?;
        info!(key = %key, items = cart.len(), "Cart loaded");

        Ok(Self {
            inner: Arc::new(CartStoreInner {
                key,
                storage,
                stock,
                catalog,
                snapshot: RwLock::new(Snapshot { cart, version: 0 }),
                mutation: Mutex::new(()),
                subscribers: Subscribers::default(),
            }),
        })
    }

    /// The current cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .cart
            .clone()
    }

    /// Number of mutations applied since the store was opened.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .version
    }

    /// Storage key of the cart entry.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Register a listener called after every applied mutation.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&CartEvent) + Send + Sync + 'static,
    {
        self.inner.subscribers.subscribe(Arc::new(listener))
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.unsubscribe(id)
    }

    /// Add one unit of a product.
    ///
    /// A product already in the cart has its amount incremented; otherwise
    /// its metadata is fetched from the catalog and it is added with amount 1.
    ///
    /// # Errors
    ///
    /// - [`CartError::OutOfStock`] if the new amount exceeds available stock
    /// - [`CartError::Service`] if the stock or catalog lookup fails
    /// - [`CartError::Storage`] if the new cart cannot be persisted
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn add(&self, id: ProductId) -> Result<CartItem> {
        let _guard = self.inner.mutation.lock().await;
        let current = self.cart();

        let (line, requested) = match current.get(id) {
            Some(existing) => (existing.clone(), u64::from(existing.amount) + 1),
            None => {
                debug!("Product not in cart, fetching from catalog");
                (self.inner.catalog.product(id).await?.into_cart_item(1), 1)
            }
        };

        let amount = self.ensure_in_stock(id, requested).await?;
        let item = line.with_amount(amount);

        self.commit(current.with_item(item.clone()), CartChange::Added { id, amount })
            .await?;
        info!(amount, "Product added to cart");
        Ok(item)
    }

    /// Remove a product's line.
    ///
    /// # Errors
    ///
    /// - [`CartError::NotInCart`] if the product has no line
    /// - [`CartError::Storage`] if the new cart cannot be persisted
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn remove(&self, id: ProductId) -> Result<CartItem> {
        let _guard = self.inner.mutation.lock().await;
        let current = self.cart();

        let Some(removed) = current.get(id).cloned() else {
            warn!("Remove requested for product not in cart");
            return Err(CartError::NotInCart(id));
        };

        self.commit(current.without(id), CartChange::Removed { id })
            .await?;
        info!("Product removed from cart");
        Ok(removed)
    }

    /// Set a product's amount.
    ///
    /// Zero or negative amounts and products not in the cart are ignored
    /// without an error; the returned [`AmountUpdate`] says which. Stock is
    /// checked before the cart lookup, so an absent product can still fail
    /// with [`CartError::OutOfStock`].
    ///
    /// # Errors
    ///
    /// - [`CartError::OutOfStock`] if `amount` exceeds available stock
    /// - [`CartError::Service`] if the stock lookup fails
    /// - [`CartError::Storage`] if the new cart cannot be persisted
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn set_amount(&self, id: ProductId, amount: i64) -> Result<AmountUpdate> {
        if amount <= 0 {
            debug!(amount, "Ignoring non-positive amount");
            return Ok(AmountUpdate::Ignored(IgnoreReason::NonPositiveAmount));
        }

        let _guard = self.inner.mutation.lock().await;
        let amount = self.ensure_in_stock(id, amount.unsigned_abs()).await?;
        let current = self.cart();

        let Some(line) = current.get(id).cloned() else {
            debug!("Ignoring amount update for product not in cart");
            return Ok(AmountUpdate::Ignored(IgnoreReason::NotInCart));
        };

        let item = line.with_amount(amount);

        self.commit(
            current.with_item(item.clone()),
            CartChange::AmountChanged { id, amount },
        )
        .await?;
        info!(amount, "Product amount updated");
        Ok(AmountUpdate::Updated(item))
    }

    /// Check `requested` against live stock and return it as a line amount.
    async fn ensure_in_stock(&self, id: ProductId, requested: u64) -> Result<u32> {
        let stock = self.inner.stock.stock(id).await?;

        if stock.is_exceeded_by(requested) {
            warn!(requested, available = stock.amount, "Requested amount exceeds stock");
            return Err(CartError::OutOfStock {
                id,
                requested,
                available: stock.amount,
            });
        }

        // Within stock, so it fits the stock's own u32.
        u32::try_from(requested).map_err(|_| CartError::OutOfStock {
            id,
            requested,
            available: stock.amount,
        })
    }

    /// Persist `cart`, install it, and notify subscribers.
    ///
    /// Must be called with the mutation lock held.
    async fn commit(&self, cart: Cart, change: CartChange) -> Result<()> {
        storage::save_cart(self.inner.storage.as_ref(), &self.inner.key, &cart).await?;

        let version = {
            let mut snapshot = self
                .inner
                .snapshot
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            snapshot.cart = cart.clone();
            snapshot.version += 1;
            snapshot.version
        };

        self.inner.subscribers.notify(&CartEvent {
            change,
            cart,
            version,
        });
        Ok(())
    }
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("key", &self.inner.key)
            .field("version", &self.version())
            .field("subscribers", &self.inner.subscribers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;
