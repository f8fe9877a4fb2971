//! RocketShoes Core - Shared types library.
//!
//! This crate provides the types shared by every RocketShoes component:
//! - `cart` - Cart store, service ports, HTTP client and storage backends
//! - `cli` - Command-line front end for the cart
//!
//! # Architecture
//!
//! The core crate contains only types and pure transforms - no I/O, no HTTP
//! clients, no storage. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Product ids, prices, catalog products, stock and cart items

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
