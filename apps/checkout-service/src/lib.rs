//! # Checkout Service
//!
//! Orchestrates order checkout and payment settlement on top of
//! `storefront-core` rules and `storefront-db` persistence.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Checkout Services                               │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  OrderService  │  │LifecycleService│  │  PaymentService            ││
//! │  │                │  │                │  │                            ││
//! │  │ • create_order │  │ • cancel_order │  │ • build_payment_redirect   ││
//! │  │ • get_order    │  │ • update_status│  │ • handle_payment_callback  ││
//! │  │ • list_orders  │  │ • delete_order │  │ • update_payment_status    ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐                                │
//! │  │InventoryService│  │DiscountService │                                │
//! │  │                │  │                │                                │
//! │  │ • stock_product│  │ • create_code  │                                │
//! │  │ • restock      │  │ • find_code    │                                │
//! │  │ • history      │  │                │                                │
//! │  └────────────────┘  └────────────────┘                                │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                         AppState                                  │  │
//! │  │                                                                   │  │
//! │  │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐│  │
//! │  │  │   Database   │  │ Catalog      │  │  CheckoutConfig          ││  │
//! │  │  │   (SQLite)   │  │ Shipping     │  │  (gateway credentials,   ││  │
//! │  │  │              │  │ Clock        │  │   timeouts)              ││  │
//! │  │  └──────────────┘  └──────────────┘  └──────────────────────────┘│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `STOREFRONT_DATABASE_PATH` - SQLite file (default: storefront.db)
//! - `STOREFRONT_DB_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `STOREFRONT_SHIPPING_TIMEOUT_MS` - Shipping quote bound (default: 3000)
//! - `STOREFRONT_VNPAY_TMN_CODE` - Merchant code
//! - `STOREFRONT_VNPAY_HASH_SECRET` - Signing secret (required in release builds)
//! - `STOREFRONT_VNPAY_PAY_URL` - Gateway payment page
//! - `STOREFRONT_VNPAY_RETURN_URL` - Browser return URL
//! - `STOREFRONT_VNPAY_IPN_URL` - Server-to-server callback URL

pub mod collaborators;
pub mod config;
pub mod error;
pub mod services;

use std::sync::Arc;

use storefront_db::Database;

// Re-exports
pub use collaborators::{Catalog, Clock, ShippingEstimator, ShippingQuote};
pub use config::CheckoutConfig;
pub use error::{CheckoutError, CheckoutResult, ErrorKind};

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub catalog: Arc<dyn Catalog>,
    pub shipping: Arc<dyn ShippingEstimator>,
    pub clock: Arc<dyn Clock>,
    pub config: CheckoutConfig,
}
