//! Storefront - cart, checkout and order history
//!
//! ## Features
//! - Per-user shopping cart priced against the live catalog
//! - Atomic checkout turning a cart into an immutable, paid order
//! - Order history with price snapshots decoupled from the catalog
//! - Order events published to NATS

pub mod api;
pub mod config;
pub mod domain;
pub mod identity;
pub mod publisher;
pub mod services;
pub mod store;

use thiserror::Error;
use uuid::Uuid;

pub use domain::aggregates::{Cart, CartLine, Order, OrderItem, OrderStatus, PricedCart, PricedLine, Product};
pub use domain::value_objects::{Money, Quantity};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum CommerceError {
    #[error("Product {0} not found")]
    ProductNotFound(Uuid),

    #[error("Order {0} not found")]
    OrderNotFound(Uuid),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Concurrent update: {0}")]
    Conflict(String),

    #[error("Order already finalized")]
    OrderFinalized,

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, CommerceError>;

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const UNIQUE_VIOLATION: &str = "23505";
const NUMERIC_OUT_OF_RANGE: &str = "22003";

impl From<sqlx::Error> for CommerceError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if let Some(code) = db.code() {
                match code.as_ref() {
                    SERIALIZATION_FAILURE | DEADLOCK_DETECTED | UNIQUE_VIOLATION => {
                        return Self::Conflict(db.message().to_string());
                    }
                    // Overflow comes from oversized quantities: a merged line past i32::MAX
                    // or a subtotal past the money column precision.
                    NUMERIC_OUT_OF_RANGE => {
                        return Self::InvalidQuantity(domain::value_objects::QuantityError::TooLarge.to_string());
                    }
                    _ => {}
                }
            }
        }
        Self::Storage(e.to_string())
    }
}

impl From<domain::value_objects::QuantityError> for CommerceError {
    fn from(e: domain::value_objects::QuantityError) -> Self { Self::InvalidQuantity(e.to_string()) }
}

impl From<domain::aggregates::CartError> for CommerceError {
    fn from(e: domain::aggregates::CartError) -> Self {
        match e { domain::aggregates::CartError::Quantity(q) => q.into() }
    }
}

impl From<domain::aggregates::OrderError> for CommerceError {
    fn from(e: domain::aggregates::OrderError) -> Self {
        match e {
            domain::aggregates::OrderError::NoItems => Self::EmptyCart,
            domain::aggregates::OrderError::Finalized => Self::OrderFinalized,
            domain::aggregates::OrderError::UnknownStatus(s) => Self::Storage(format!("unknown order status '{s}'")),
        }
    }
}
