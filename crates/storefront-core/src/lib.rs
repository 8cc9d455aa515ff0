//! # storefront-core: Checkout Rules for the Storefront
//!
//! Every rule that decides what an order costs and how it may change lives
//! here, as pure functions with no I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Storefront Checkout                                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 checkout-service (orchestration)                │   │
//! │  │   OrderService ──► LifecycleService ──► PaymentService          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ storefront-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌──────────┐ ┌──────────┐ ┌────────┐ ┌─────────┐ │   │
//! │  │   │  money  │ │ discount │ │  order   │ │gateway │ │validation│ │   │
//! │  │   │  Money  │ │ evaluate │ │ totals   │ │ sign   │ │  cart   │ │   │
//! │  │   │         │ │ conflict │ │ states   │ │ verify │ │ inputs  │ │   │
//! │  │   └─────────┘ └──────────┘ └──────────┘ └────────┘ └─────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • NO CLOCK                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 storefront-db (Database Layer)                  │   │
//! │  │         inventory ledger, discount codes, orders, payments      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Order, Payment, DiscountCode, ...)
//! - [`money`] - Integer minor-unit money
//! - [`error`] - Domain error types
//! - [`validation`] - Input checks run before any mutation
//! - [`discount`] - Discount code evaluation and promotion conflicts
//! - [`order`] - Pricing and the order state machine
//! - [`gateway`] - Payment gateway signing and callback verification
//!
//! ## Example Usage
//!
//! ```rust
//! use storefront_core::order::{ensure_transition, OrderTotals};
//! use storefront_core::{Money, OrderLine, OrderStatus};
//!
//! let lines = vec![OrderLine {
//!     product_id: 7,
//!     quantity: 2,
//!     unit_price: Money::from_major(500_000),
//! }];
//! let totals = OrderTotals::compute(&lines, Money::zero(), Some(Money::from_major(30_000)))?;
//! assert_eq!(totals.total_price, Money::from_major(1_030_000));
//!
//! assert!(ensure_transition("o-1", OrderStatus::Pending, OrderStatus::Shipped).is_ok());
//! assert!(ensure_transition("o-1", OrderStatus::Shipped, OrderStatus::Cancelled).is_err());
//! # Ok::<(), storefront_core::CoreError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod discount;
pub mod error;
pub mod gateway;
pub mod money;
pub mod order;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, DiscountError, ValidationError};
pub use gateway::{CallbackOutcome, CallbackReport, GatewayConfig, GatewayParams};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity on a single cart line.
///
/// Catches typos like 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;
