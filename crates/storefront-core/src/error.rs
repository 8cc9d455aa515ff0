//! # Error Types
//!
//! Domain-specific error types for storefront-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  storefront-core (this file)                                           │
//! │  ├── CoreError        - Business rule violations                       │
//! │  ├── DiscountError    - Why a discount code was refused                │
//! │  └── ValidationError  - Malformed input                                │
//! │                                                                         │
//! │  storefront-db                                                         │
//! │  └── DbError          - Database failures (wraps CoreError)            │
//! │                                                                         │
//! │  checkout-service                                                      │
//! │  └── CheckoutError    - What callers see, classified by ErrorKind      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → CheckoutError           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Error messages name the product, order or code at fault. They never carry
//! the gateway secret.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::money::Money;
use crate::types::{OrderStatus, ProductId};

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Not enough stock to reserve.
    ///
    /// ## When This Occurs
    /// - A cart line asks for more units than the ledger holds
    /// - A concurrent order took the last units first
    ///
    /// ```text
    /// reserve(product 7, qty 5)
    ///      │
    ///      ▼
    /// stock = 3  ──►  InsufficientStock { product_id: 7, available: 3, requested: 5 }
    /// ```
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },

    /// Product id and quantity lists differ in length.
    #[error("Mismatched line counts: {products} products, {quantities} quantities")]
    MismatchedLineCounts { products: usize, quantities: usize },

    /// Payment method string is not a known method.
    #[error("Invalid payment method: '{0}'")]
    InvalidPaymentMethod(String),

    #[error("Invalid order status: '{0}'")]
    InvalidOrderStatus(String),

    #[error("Invalid payment status: '{0}'")]
    InvalidPaymentStatus(String),

    /// The order state machine refuses the move.
    ///
    /// ## When This Occurs
    /// - Cancelling anything but a PENDING order
    /// - Moving out of COMPLETED or CANCELLED
    /// - "Transitioning" to the current status
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Gateway amounts must be strictly positive.
    #[error("Invalid payment amount: {amount}")]
    InvalidAmount { amount: Money },

    /// An order amount left the representable range.
    #[error("Amount overflow while computing {what}")]
    AmountOverflow { what: &'static str },

    /// HMAC key setup failed.
    #[error("Signing key rejected")]
    SigningKey,

    #[error("Discount rejected: {0}")]
    Discount(#[from] DiscountError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Discount Error
// =============================================================================

/// Reasons a discount code is refused.
///
/// Checks run in declaration order; the first failing one is reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscountError {
    #[error("Unknown discount code '{0}'")]
    UnknownCode(String),

    #[error("Discount code '{0}' has already been used")]
    AlreadyUsed(String),

    #[error("Discount code '{code}' is not valid until {valid_from}")]
    NotYetValid {
        code: String,
        valid_from: DateTime<Utc>,
    },

    #[error("Discount code '{code}' expired at {valid_to}")]
    Expired {
        code: String,
        valid_to: DateTime<Utc>,
    },

    #[error("Discount code '{code}' requires a subtotal of at least {minimum}, got {subtotal}")]
    BelowMinimum {
        code: String,
        minimum: Money,
        subtotal: Money,
    },

    /// A cart line is under its own product promotion.
    ///
    /// Per-product promotions and storewide codes never stack.
    #[error("Discount code '{code}' cannot be combined with the running promotion on product {product_id}")]
    ConflictingPromotion { code: String, product_id: ProductId },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before any mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
