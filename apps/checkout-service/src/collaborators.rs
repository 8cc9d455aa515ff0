//! Collaborators the checkout consumes but does not own.
//!
//! ```text
//! ┌──────────────────┐   ┌────────────────────┐   ┌──────────────┐
//! │ Catalog          │   │ ShippingEstimator  │   │ Clock        │
//! │ get_product(id)  │   │ estimate(addr, c)  │   │ now()        │
//! └──────────────────┘   └────────────────────┘   └──────────────┘
//!          ▲                       ▲                      ▲
//!          └───────────── injected into AppState ─────────┘
//! ```
//!
//! Simple in-process implementations live here too. The demo binary and
//! the integration tests use them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use storefront_core::{Money, Product, ProductId};

// =============================================================================
// Catalog
// =============================================================================

/// Read access to product data.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_product(&self, id: ProductId) -> Option<Product>;
}

/// Catalog backed by a fixed map.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: HashMap<ProductId, Product>,
}

impl InMemoryCatalog {
    pub fn new(products: impl IntoIterator<Item = Product>) -> Self {
        InMemoryCatalog {
            products: products.into_iter().map(|p| (p.id, p)).collect(),
        }
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_product(&self, id: ProductId) -> Option<Product> {
        self.products.get(&id).cloned()
    }
}

// =============================================================================
// Shipping
// =============================================================================

/// A carrier's price and delivery estimate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingQuote {
    /// None counts as free shipping.
    pub fee: Option<Money>,
    pub estimated_delivery: Option<NaiveDate>,
}

/// The carrier could not quote.
#[derive(Debug, Clone, thiserror::Error)]
#[error("carrier '{carrier}' unavailable: {reason}")]
pub struct CarrierUnavailable {
    pub carrier: String,
    pub reason: String,
}

impl CarrierUnavailable {
    pub fn new(carrier: impl Into<String>, reason: impl Into<String>) -> Self {
        CarrierUnavailable {
            carrier: carrier.into(),
            reason: reason.into(),
        }
    }
}

/// Quotes shipping for a delivery address.
#[async_trait]
pub trait ShippingEstimator: Send + Sync {
    async fn estimate(&self, address: &str, carrier: &str) -> Result<ShippingQuote, CarrierUnavailable>;
}

/// Fixed fee per carrier name, matched case-insensitively.
pub struct FlatRateShipping {
    rates: HashMap<String, (Money, i64)>,
    clock: Arc<dyn Clock>,
}

impl FlatRateShipping {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        FlatRateShipping {
            rates: HashMap::new(),
            clock,
        }
    }

    /// Adds a carrier charging `fee` with delivery after `days`.
    pub fn carrier(mut self, name: &str, fee: Money, days: i64) -> Self {
        self.rates.insert(name.to_ascii_lowercase(), (fee, days));
        self
    }
}

#[async_trait]
impl ShippingEstimator for FlatRateShipping {
    async fn estimate(&self, _address: &str, carrier: &str) -> Result<ShippingQuote, CarrierUnavailable> {
        let (fee, days) = self
            .rates
            .get(&carrier.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| CarrierUnavailable::new(carrier, "no rate configured"))?;

        Ok(ShippingQuote {
            fee: Some(fee),
            estimated_delivery: Some((self.clock.now() + Duration::days(days)).date_naive()),
        })
    }
}

// =============================================================================
// Clock
// =============================================================================

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        FixedClock { now: RwLock::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}
