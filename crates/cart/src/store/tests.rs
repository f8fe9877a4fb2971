use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use rocketshoes_core::{Price, Product, StockInfo};

use super::*;
use crate::services::ServiceError;
use crate::storage::{MemoryStorage, StorageError};

const KEY: &str = "@RocketShoes:cart";

mock! {
    Stock {}

    #[async_trait]
    impl StockService for Stock {
        async fn stock(&self, id: ProductId) -> std::result::Result<StockInfo, ServiceError>;
    }
}

mock! {
    Catalog {}

    #[async_trait]
    impl CatalogService for Catalog {
        async fn product(&self, id: ProductId) -> std::result::Result<Product, ServiceError>;
    }
}

/// Storage whose writes always fail.
struct ReadOnlyStorage {
    inner: MemoryStorage,
}

#[async_trait]
impl CartStorage for ReadOnlyStorage {
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, StorageError> {
        self.inner.get(key).await
    }

    async fn set(&self, _key: &str, _value: String) -> std::result::Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::other("disk full")))
    }

    async fn remove(&self, _key: &str) -> std::result::Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::other("disk full")))
    }
}

/// Stock service that answers slowly, to force operations to overlap.
struct SlowStock {
    amount: u32,
}

#[async_trait]
impl StockService for SlowStock {
    async fn stock(&self, id: ProductId) -> std::result::Result<StockInfo, ServiceError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(StockInfo {
            id,
            amount: self.amount,
        })
    }
}

fn product(id: u32) -> Product {
    Product {
        id: ProductId::new(id),
        title: format!("Tênis {id}"),
        price: Price::from_cents(17_990),
        image: format!("https://example.com/{id}.jpg"),
    }
}

fn line(id: u32, amount: u32) -> CartItem {
    product(id).into_cart_item(amount)
}

fn stock_of(amount: u32) -> MockStock {
    let mut stock = MockStock::new();
    stock
        .expect_stock()
        .returning(move |id| Ok(StockInfo { id, amount }));
    stock
}

fn catalog_with(ids: &'static [u32]) -> MockCatalog {
    let mut catalog = MockCatalog::new();
    catalog.expect_product().returning(|id| {
        if ids.contains(&id.as_u32()) {
            Ok(product(id.as_u32()))
        } else {
            Err(ServiceError::NotFound(format!("products/{id}")))
        }
    });
    catalog
}

fn no_catalog() -> MockCatalog {
    let mut catalog = MockCatalog::new();
    catalog.expect_product().never();
    catalog
}

async fn seeded_storage(cart: &Cart) -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new());
    storage::save_cart(storage.as_ref(), KEY, cart).await.unwrap();
    storage
}

async fn open(
    storage: Arc<MemoryStorage>,
    stock: impl StockService + 'static,
    catalog: impl CatalogService + 'static,
) -> CartStore {
    CartStore::open(KEY, storage, Arc::new(stock), Arc::new(catalog))
        .await
        .unwrap()
}

async fn persisted(storage: &MemoryStorage) -> Cart {
    storage::load_cart(storage, KEY).await.unwrap()
}

// =============================================================================
// Open
// =============================================================================

#[tokio::test]
async fn test_open_without_entry_is_empty() {
    let store = open(Arc::new(MemoryStorage::new()), MockStock::new(), no_catalog()).await;
    assert!(store.cart().is_empty());
    assert_eq!(store.version(), 0);
    assert_eq!(store.key(), KEY);
}

#[tokio::test]
async fn test_open_restores_persisted_cart() {
    let cart = Cart::new().with_item(line(1, 2)).with_item(line(2, 1));
    let store = open(seeded_storage(&cart).await, MockStock::new(), no_catalog()).await;
    assert_eq!(store.cart(), cart);
}

#[tokio::test]
async fn test_open_rejects_corrupt_entry() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set(KEY, "not json".to_string()).await.unwrap();

    let err = CartStore::open(KEY, storage, Arc::new(MockStock::new()), Arc::new(no_catalog()))
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::Storage(StorageError::Corrupt(_))));
}

// =============================================================================
// Add
// =============================================================================

#[tokio::test]
async fn test_add_new_product_with_amount_one() {
    let storage = Arc::new(MemoryStorage::new());
    let store = open(Arc::clone(&storage), stock_of(5), catalog_with(&[1])).await;

    let item = store.add(ProductId::new(1)).await.unwrap();

    assert_eq!(item.amount, 1);
    let cart = store.cart();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart.get(ProductId::new(1)).unwrap().amount, 1);
    assert_eq!(persisted(&storage).await, cart);
    assert_eq!(store.version(), 1);
}

#[tokio::test]
async fn test_add_existing_product_increments_without_catalog() {
    let cart = Cart::new().with_item(line(1, 2)).with_item(line(2, 1));
    let storage = seeded_storage(&cart).await;
    let store = open(Arc::clone(&storage), stock_of(3), no_catalog()).await;

    let item = store.add(ProductId::new(1)).await.unwrap();

    assert_eq!(item.amount, 3);
    let cart = store.cart();
    assert_eq!(cart.get(ProductId::new(1)).unwrap().amount, 3);
    assert_eq!(cart.get(ProductId::new(2)).unwrap().amount, 1);
    assert_eq!(persisted(&storage).await, cart);
}

#[tokio::test]
async fn test_add_beyond_stock_leaves_cart_unchanged() {
    let cart = Cart::new().with_item(line(1, 3));
    let storage = seeded_storage(&cart).await;
    let store = open(Arc::clone(&storage), stock_of(3), no_catalog()).await;

    let err = store.add(ProductId::new(1)).await.unwrap_err();

    assert!(matches!(
        err,
        CartError::OutOfStock {
            requested: 4,
            available: 3,
            ..
        }
    ));
    assert_eq!(store.cart(), cart);
    assert_eq!(persisted(&storage).await, cart);
    assert_eq!(store.version(), 0);
}

#[tokio::test]
async fn test_add_new_product_with_no_stock() {
    let storage = Arc::new(MemoryStorage::new());
    let store = open(Arc::clone(&storage), stock_of(0), catalog_with(&[1])).await;

    let err = store.add(ProductId::new(1)).await.unwrap_err();

    assert_eq!(err.kind(), crate::ErrorKind::InsufficientStock);
    assert!(store.cart().is_empty());
    assert_eq!(storage.get(KEY).await.unwrap(), None);
}

#[tokio::test]
async fn test_add_unknown_product_is_unexpected_failure() {
    let storage = Arc::new(MemoryStorage::new());
    let mut stock = MockStock::new();
    stock.expect_stock().never();
    let store = open(Arc::clone(&storage), stock, catalog_with(&[])).await;

    let err = store.add(ProductId::new(42)).await.unwrap_err();

    assert!(matches!(err, CartError::Service(ServiceError::NotFound(_))));
    assert_eq!(err.notice(crate::CartOperation::Add), "Failed to add product");
    assert!(store.cart().is_empty());
}

#[tokio::test]
async fn test_add_stock_failure_leaves_cart_unchanged() {
    let mut stock = MockStock::new();
    stock.expect_stock().returning(|_| {
        Err(ServiceError::Api {
            status: 503,
            message: "unavailable".to_string(),
        })
    });
    let store = open(Arc::new(MemoryStorage::new()), stock, catalog_with(&[1])).await;

    let err = store.add(ProductId::new(1)).await.unwrap_err();

    assert_eq!(err.kind(), crate::ErrorKind::Unexpected);
    assert!(store.cart().is_empty());
}

#[tokio::test]
async fn test_add_moves_replaced_line_to_end() {
    let cart = Cart::new().with_item(line(1, 1)).with_item(line(2, 1));
    let store = open(seeded_storage(&cart).await, stock_of(10), no_catalog()).await;

    store.add(ProductId::new(1)).await.unwrap();

    let ids: Vec<u32> = store.cart().iter().map(|i| i.id.as_u32()).collect();
    assert_eq!(ids, vec![2, 1]);
}

#[tokio::test]
async fn test_concurrent_adds_are_serialized() {
    let mut catalog = MockCatalog::new();
    catalog
        .expect_product()
        .times(1)
        .returning(|id| Ok(product(id.as_u32())));
    let storage = Arc::new(MemoryStorage::new());
    let store = open(Arc::clone(&storage), SlowStock { amount: 10 }, catalog).await;

    let (first, second) = tokio::join!(store.add(ProductId::new(1)), store.add(ProductId::new(1)));
    first.unwrap();
    second.unwrap();

    assert_eq!(store.cart().get(ProductId::new(1)).unwrap().amount, 2);
    assert_eq!(persisted(&storage).await, store.cart());
    assert_eq!(store.version(), 2);
}

#[tokio::test]
async fn test_storage_failure_leaves_memory_unchanged() {
    let storage = Arc::new(ReadOnlyStorage {
        inner: MemoryStorage::new(),
    });
    let store = CartStore::open(KEY, storage, Arc::new(stock_of(5)), Arc::new(catalog_with(&[1])))
        .await
        .unwrap();
    let events = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&events);
    store.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let err = store.add(ProductId::new(1)).await.unwrap_err();

    assert!(matches!(err, CartError::Storage(StorageError::Io(_))));
    assert!(store.cart().is_empty());
    assert_eq!(store.version(), 0);
    assert_eq!(events.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Remove
// =============================================================================

#[tokio::test]
async fn test_remove_present_product() {
    let cart = Cart::new().with_item(line(1, 2)).with_item(line(2, 1));
    let storage = seeded_storage(&cart).await;
    let store = open(Arc::clone(&storage), MockStock::new(), no_catalog()).await;

    let removed = store.remove(ProductId::new(1)).await.unwrap();

    assert_eq!(removed.amount, 2);
    let cart = store.cart();
    assert_eq!(cart.len(), 1);
    assert!(!cart.contains(ProductId::new(1)));
    assert_eq!(persisted(&storage).await, cart);
}

#[tokio::test]
async fn test_remove_absent_product_reports_not_found() {
    let cart = Cart::new().with_item(line(2, 1));
    let storage = seeded_storage(&cart).await;
    let store = open(Arc::clone(&storage), MockStock::new(), no_catalog()).await;

    let err = store.remove(ProductId::new(1)).await.unwrap_err();

    assert!(matches!(err, CartError::NotInCart(id) if id == ProductId::new(1)));
    assert_eq!(err.notice(crate::CartOperation::Remove), "Failed to remove product");
    assert_eq!(store.cart(), cart);
}

#[tokio::test]
async fn test_remove_twice() {
    let cart = Cart::new().with_item(line(1, 1));
    let store = open(seeded_storage(&cart).await, MockStock::new(), no_catalog()).await;

    store.remove(ProductId::new(1)).await.unwrap();
    let after_first = store.cart();
    let err = store.remove(ProductId::new(1)).await.unwrap_err();

    assert_eq!(err.kind(), crate::ErrorKind::NotFound);
    assert_eq!(store.cart(), after_first);
    assert_eq!(store.version(), 1);
}

// =============================================================================
// Set amount
// =============================================================================

#[tokio::test]
async fn test_set_amount_non_positive_is_ignored() {
    let cart = Cart::new().with_item(line(1, 2));
    let mut stock = MockStock::new();
    stock.expect_stock().never();
    let store = open(seeded_storage(&cart).await, stock, no_catalog()).await;

    for amount in [0, -1, i64::MIN] {
        let outcome = store.set_amount(ProductId::new(1), amount).await.unwrap();
        assert_eq!(outcome, AmountUpdate::Ignored(IgnoreReason::NonPositiveAmount));
    }
    assert_eq!(store.cart(), cart);
    assert_eq!(store.version(), 0);
}

#[tokio::test]
async fn test_set_amount_within_stock() {
    let cart = Cart::new().with_item(line(1, 1)).with_item(line(2, 4));
    let storage = seeded_storage(&cart).await;
    let store = open(Arc::clone(&storage), stock_of(5), no_catalog()).await;

    let outcome = store.set_amount(ProductId::new(1), 5).await.unwrap();

    assert!(matches!(outcome, AmountUpdate::Updated(ref item) if item.amount == 5));
    let cart = store.cart();
    assert_eq!(cart.get(ProductId::new(1)).unwrap().amount, 5);
    assert_eq!(cart.get(ProductId::new(2)).unwrap().amount, 4);
    assert_eq!(persisted(&storage).await, cart);
}

#[tokio::test]
async fn test_set_amount_beyond_stock() {
    let cart = Cart::new().with_item(line(1, 1));
    let storage = seeded_storage(&cart).await;
    let store = open(Arc::clone(&storage), stock_of(2), no_catalog()).await;

    let err = store.set_amount(ProductId::new(1), 3).await.unwrap_err();

    assert_eq!(
        err.notice(crate::CartOperation::SetAmount),
        "Requested quantity is out of stock"
    );
    assert_eq!(store.cart(), cart);
    assert_eq!(persisted(&storage).await, cart);
}

#[tokio::test]
async fn test_set_amount_absent_product_within_stock_is_ignored() {
    let cart = Cart::new().with_item(line(2, 1));
    let storage = seeded_storage(&cart).await;
    let store = open(Arc::clone(&storage), stock_of(5), no_catalog()).await;

    let outcome = store.set_amount(ProductId::new(1), 2).await.unwrap();

    assert_eq!(outcome, AmountUpdate::Ignored(IgnoreReason::NotInCart));
    assert_eq!(store.cart(), cart);
    assert_eq!(persisted(&storage).await, cart);
    assert_eq!(store.version(), 0);
}

#[tokio::test]
async fn test_set_amount_absent_product_beyond_stock_fails() {
    let cart = Cart::new().with_item(line(2, 1));
    let store = open(seeded_storage(&cart).await, stock_of(2), no_catalog()).await;

    let err = store.set_amount(ProductId::new(1), 5).await.unwrap_err();

    assert!(matches!(
        err,
        CartError::OutOfStock {
            requested: 5,
            available: 2,
            ..
        }
    ));
    assert_eq!(store.cart(), cart);
}

#[tokio::test]
async fn test_set_amount_absent_product_stock_failure_is_unexpected() {
    let cart = Cart::new().with_item(line(2, 1));
    let mut stock = MockStock::new();
    stock
        .expect_stock()
        .times(1)
        .returning(|_| Err(ServiceError::RateLimited(1)));
    let store = open(seeded_storage(&cart).await, stock, no_catalog()).await;

    let err = store.set_amount(ProductId::new(1), 1).await.unwrap_err();

    assert_eq!(err.kind(), crate::ErrorKind::Unexpected);
    assert_eq!(
        err.notice(crate::CartOperation::SetAmount),
        "Failed to update product amount"
    );
    assert_eq!(store.cart(), cart);
}

#[tokio::test]
async fn test_set_amount_larger_than_u32_is_out_of_stock() {
    let cart = Cart::new().with_item(line(1, 1));
    let store = open(seeded_storage(&cart).await, stock_of(u32::MAX), no_catalog()).await;

    let err = store
        .set_amount(ProductId::new(1), i64::from(u32::MAX) + 1)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), crate::ErrorKind::InsufficientStock);
    assert_eq!(store.cart(), cart);
}

// =============================================================================
// Subscriptions
// =============================================================================

#[tokio::test]
async fn test_subscribers_receive_changes_in_order() {
    let storage = Arc::new(MemoryStorage::new());
    let store = open(storage, stock_of(5), catalog_with(&[1, 2])).await;
    let seen: Arc<StdMutex<Vec<CartEvent>>> = Arc::default();
    let sink = Arc::clone(&seen);
    store.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

    store.add(ProductId::new(1)).await.unwrap();
    store.add(ProductId::new(2)).await.unwrap();
    store.set_amount(ProductId::new(2), 3).await.unwrap();
    store.remove(ProductId::new(1)).await.unwrap();
    let _ = store.remove(ProductId::new(1)).await;
    store.set_amount(ProductId::new(2), 0).await.unwrap();

    let events = seen.lock().unwrap();
    let changes: Vec<CartChange> = events.iter().map(|e| e.change).collect();
    assert_eq!(
        changes,
        vec![
            CartChange::Added {
                id: ProductId::new(1),
                amount: 1
            },
            CartChange::Added {
                id: ProductId::new(2),
                amount: 1
            },
            CartChange::AmountChanged {
                id: ProductId::new(2),
                amount: 3
            },
            CartChange::Removed {
                id: ProductId::new(1)
            },
        ]
    );
    let versions: Vec<u64> = events.iter().map(|e| e.version).collect();
    assert_eq!(versions, vec![1, 2, 3, 4]);
    assert_eq!(events.last().unwrap().cart, store.cart());
}

#[tokio::test]
async fn test_unsubscribed_listener_is_not_called() {
    let store = open(Arc::new(MemoryStorage::new()), stock_of(5), catalog_with(&[1])).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let id = store.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    store.add(ProductId::new(1)).await.unwrap();
    assert!(store.unsubscribe(id));
    store.add(ProductId::new(1)).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_clones_share_state() {
    let store = open(Arc::new(MemoryStorage::new()), stock_of(5), catalog_with(&[1])).await;
    let handle = store.clone();

    handle.add(ProductId::new(1)).await.unwrap();

    assert_eq!(store.cart().len(), 1);
    assert_eq!(store.version(), handle.version());
}
