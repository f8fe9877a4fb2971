//! RocketShoes cart library.
//!
//! Session cart state for the storefront: add, remove and set-amount
//! operations validated against live stock, mirrored to local storage after
//! every change.
//!
//! # Architecture
//!
//! - [`store`] - The [`CartStore`] and its change subscriptions
//! - [`services`] - Stock and catalog ports, plus the REST [`ApiClient`]
//! - [`storage`] - Key-value persistence ports and backends
//! - [`config`] - Environment-driven configuration
//! - [`error`] - Operation errors and their user-facing notices

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod services;
pub mod storage;
pub mod store;

pub use config::{ApiConfig, CartConfig, ConfigError};
pub use error::{CartError, CartOperation, ErrorKind};
pub use services::{ApiClient, CatalogService, ServiceError, StockService};
pub use storage::{CartStorage, FileStorage, MemoryStorage, StorageError};
pub use store::{AmountUpdate, CartChange, CartEvent, CartStore, IgnoreReason, SubscriptionId};
