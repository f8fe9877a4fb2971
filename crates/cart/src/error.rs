//! Cart operation errors.
//!
//! Every failed operation leaves the cart unchanged and returns a
//! [`CartError`]. The store never presents anything to the user; callers map
//! errors to a message with [`CartError::notice`].

use rocketshoes_core::ProductId;
use thiserror::Error;

use crate::services::ServiceError;
use crate::storage::StorageError;

/// The cart operations that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartOperation {
    Add,
    Remove,
    SetAmount,
}

/// Coarse classification of a [`CartError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Requested amount is above available stock.
    InsufficientStock,
    /// The product is not in the cart.
    NotFound,
    /// Transport, catalog or storage failure.
    Unexpected,
}

/// Error returned by a cart operation.
#[derive(Debug, Error)]
pub enum CartError {
    /// Requested amount exceeds available stock.
    #[error("Out of stock: product {id} has {available} available, {requested} requested")]
    OutOfStock {
        id: ProductId,
        requested: u64,
        available: u32,
    },

    /// The product has no line in the cart.
    #[error("Not in cart: product {0}")]
    NotInCart(ProductId),

    /// Stock or catalog lookup failed.
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// Reading or writing persisted state failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CartError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::OutOfStock { .. } => ErrorKind::InsufficientStock,
            Self::NotInCart(_) => ErrorKind::NotFound,
            Self::Service(_) | Self::Storage(_) => ErrorKind::Unexpected,
        }
    }

    /// User-facing message for this error raised by `operation`.
    ///
    /// Stock errors get their own message; everything else is reported as a
    /// generic failure of the operation so transport details never leak.
    #[must_use]
    pub const fn notice(&self, operation: CartOperation) -> &'static str {
        if let Self::OutOfStock { .. } = self {
            return "Requested quantity is out of stock";
        }
        match operation {
            CartOperation::Add => "Failed to add product",
            CartOperation::Remove => "Failed to remove product",
            CartOperation::SetAmount => "Failed to update product amount",
        }
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_error_display() {
        let err = CartError::NotInCart(ProductId::new(4));
        assert_eq!(err.to_string(), "Not in cart: product 4");

        let err = CartError::OutOfStock {
            id: ProductId::new(1),
            requested: 4,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "Out of stock: product 1 has 3 available, 4 requested"
        );
    }

    #[test]
    fn test_cart_error_kinds() {
        let out_of_stock = CartError::OutOfStock {
            id: ProductId::new(1),
            requested: 2,
            available: 1,
        };
        assert_eq!(out_of_stock.kind(), ErrorKind::InsufficientStock);
        assert_eq!(
            CartError::NotInCart(ProductId::new(1)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CartError::Service(ServiceError::NotFound("products/1".to_string())).kind(),
            ErrorKind::Unexpected
        );
        assert_eq!(
            CartError::Storage(StorageError::Corrupt("bad".to_string())).kind(),
            ErrorKind::Unexpected
        );
    }

    #[test]
    fn test_notices() {
        let out_of_stock = CartError::OutOfStock {
            id: ProductId::new(1),
            requested: 2,
            available: 1,
        };
        assert_eq!(
            out_of_stock.notice(CartOperation::Add),
            "Requested quantity is out of stock"
        );
        assert_eq!(
            out_of_stock.notice(CartOperation::SetAmount),
            "Requested quantity is out of stock"
        );

        let missing = CartError::NotInCart(ProductId::new(1));
        assert_eq!(missing.notice(CartOperation::Remove), "Failed to remove product");

        let transport = CartError::Service(ServiceError::Api {
            status: 502,
            message: "bad gateway".to_string(),
        });
        assert_eq!(transport.notice(CartOperation::Add), "Failed to add product");
        assert_eq!(
            transport.notice(CartOperation::SetAmount),
            "Failed to update product amount"
        );
    }
}
