//! Cart commands.
//!
//! This module is the presentation layer for the cart store: it turns
//! [`CartError`]s into the user-facing notices and reports unexpected
//! failures to Sentry.
//!
//! # Environment Variables
//!
//! - `ROCKETSHOES_API_URL` - Storefront API serving stock and products
//! - `ROCKETSHOES_STORAGE_PATH` - Local storage file

use std::sync::Arc;

use rocketshoes_cart::{
    AmountUpdate, ApiClient, CartConfig, CartError, CartOperation, CartStorage, CartStore,
    ErrorKind, FileStorage, IgnoreReason,
};
use rocketshoes_core::{Cart, ProductId};
use tracing::{debug, error, info, warn};

/// Open the session cart described by `config`.
///
/// # Errors
///
/// Returns an error if the API client cannot be built or the persisted cart
/// cannot be loaded.
pub async fn open(config: &CartConfig) -> Result<CartStore, Box<dyn std::error::Error>> {
    let client = Arc::new(ApiClient::new(&config.api)?);
    let storage = Arc::new(FileStorage::new(&config.storage_path));

    let store = CartStore::open(&config.cart_key, storage, client.clone(), client)
        .await
        .inspect_err(|_| {
            error!(
                path = %config.storage_path.display(),
                "Could not load cart, run `rs-cli cart clear` to reset it"
            );
        })?;

    store.subscribe(|event| {
        debug!(version = event.version, change = ?event.change, "Cart changed");
    });

    Ok(store)
}

/// Log the cart lines and totals.
pub fn show(store: &CartStore) {
    render(&store.cart());
}

/// Add one unit of `id`.
///
/// # Errors
///
/// Returns the operation's error after reporting its notice.
pub async fn add(store: &CartStore, id: ProductId) -> Result<(), CartError> {
    let item = store
        .add(id)
        .await
        .map_err(|e| report(e, CartOperation::Add))?;
    info!("Added {} (now {} in cart)", item.title, item.amount);
    render(&store.cart());
    Ok(())
}

/// Remove the line for `id`.
///
/// # Errors
///
/// Returns the operation's error after reporting its notice.
pub async fn remove(store: &CartStore, id: ProductId) -> Result<(), CartError> {
    let item = store
        .remove(id)
        .await
        .map_err(|e| report(e, CartOperation::Remove))?;
    info!("Removed {}", item.title);
    render(&store.cart());
    Ok(())
}

/// Set the amount of `id`.
///
/// # Errors
///
/// Returns the operation's error after reporting its notice.
pub async fn set_amount(store: &CartStore, id: ProductId, amount: i64) -> Result<(), CartError> {
    let outcome = store
        .set_amount(id, amount)
        .await
        .map_err(|e| report(e, CartOperation::SetAmount))?;

    match outcome {
        AmountUpdate::Updated(item) => {
            info!("{} set to {}", item.title, item.amount);
            render(&store.cart());
        }
        AmountUpdate::Ignored(IgnoreReason::NonPositiveAmount) => {
            info!("Amount must be at least 1, nothing changed");
        }
        AmountUpdate::Ignored(IgnoreReason::NotInCart) => {
            info!("Product {id} is not in the cart, nothing changed");
        }
    }
    Ok(())
}

/// Delete the persisted cart.
///
/// Works even when the stored cart is unreadable.
///
/// # Errors
///
/// Returns an error if the storage file cannot be updated.
pub async fn clear(config: &CartConfig) -> Result<(), Box<dyn std::error::Error>> {
    FileStorage::new(&config.storage_path)
        .remove(&config.cart_key)
        .await?;
    info!(path = %config.storage_path.display(), "Cart cleared");
    Ok(())
}

/// Present an operation failure and hand the error back.
fn report(err: CartError, operation: CartOperation) -> CartError {
    warn!("{}", err.notice(operation));
    if err.kind() == ErrorKind::Unexpected {
        let event_id = sentry::capture_error(&err);
        error!(error = %err, sentry_event_id = %event_id, "Cart operation failed");
    }
    err
}

fn render(cart: &Cart) {
    if cart.is_empty() {
        info!("Cart is empty");
        return;
    }

    for item in cart {
        info!(
            "#{:<4} {:<40} {:>3} x {:>10} = {:>10}",
            item.id.to_string(),
            item.title,
            item.amount,
            item.price.to_string(),
            item.line_total().to_string()
        );
    }
    info!(
        "{} products, {} units, subtotal {}",
        cart.len(),
        cart.total_quantity(),
        cart.subtotal()
    );
}
