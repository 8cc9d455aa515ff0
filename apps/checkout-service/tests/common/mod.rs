//! Shared fixtures for the checkout integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use checkout_service::collaborators::{
    CarrierUnavailable, FixedClock, InMemoryCatalog, ShippingEstimator, ShippingQuote,
};
use checkout_service::services::{
    CheckoutRequest, DiscountService, InventoryService, LifecycleService, NewDiscountCode,
    OrderService, PaymentService,
};
use checkout_service::{AppState, CheckoutConfig};
use storefront_core::gateway::{self, GatewayParams, SECURE_HASH};
use storefront_core::{Actor, Money, Product, Promotion, Role};
use storefront_db::{Database, DbConfig};

pub const SECRET: &str = "integration-test-secret";

pub const MUG: i64 = 7;
pub const KETTLE: i64 = 9;
pub const GRINDER: i64 = 11;

pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn admin() -> Actor {
    Actor::new("admin-1", [Role::Admin])
}

pub fn staff() -> Actor {
    Actor::new("staff-1", [Role::Staff])
}

pub fn alice() -> Actor {
    Actor::customer("alice")
}

pub fn bob() -> Actor {
    Actor::customer("bob")
}

/// Catalog used by every test: two regular products and one on promotion.
pub fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new([
        Product {
            id: MUG,
            name: "Ceramic Mug".to_string(),
            selling_price: Money::from_major(500_000),
            promotion: None,
        },
        Product {
            id: KETTLE,
            name: "Pour-over Kettle".to_string(),
            selling_price: Money::from_major(1_200_000),
            promotion: None,
        },
        Product {
            id: GRINDER,
            name: "Burr Grinder".to_string(),
            selling_price: Money::from_major(2_000_000),
            promotion: Some(Promotion {
                price: Money::from_major(1_500_000),
                starts_at: noon() - Duration::days(1),
                ends_at: noon() + Duration::days(1),
            }),
        },
    ])
}

// =============================================================================
// Fake shipping
// =============================================================================

#[derive(Debug, Clone)]
pub enum ShippingBehavior {
    Quote(Option<Money>),
    Unavailable,
    Hang,
}

pub struct FakeShipping {
    behavior: ShippingBehavior,
}

#[async_trait]
impl ShippingEstimator for FakeShipping {
    async fn estimate(&self, _address: &str, carrier: &str) -> Result<ShippingQuote, CarrierUnavailable> {
        match &self.behavior {
            ShippingBehavior::Quote(fee) => Ok(ShippingQuote {
                fee: *fee,
                estimated_delivery: Some((noon() + Duration::days(3)).date_naive()),
            }),
            ShippingBehavior::Unavailable => Err(CarrierUnavailable::new(carrier, "carrier offline")),
            ShippingBehavior::Hang => {
                tokio::time::sleep(StdDuration::from_secs(60)).await;
                Err(CarrierUnavailable::new(carrier, "never answered"))
            }
        }
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub state: Arc<AppState>,
    pub clock: Arc<FixedClock>,
    pub orders: OrderService,
    pub lifecycle: LifecycleService,
    pub payments: PaymentService,
    pub inventory: InventoryService,
    pub discounts: DiscountService,
}

pub fn config() -> CheckoutConfig {
    let vars: HashMap<String, String> = [
        ("STOREFRONT_VNPAY_HASH_SECRET", SECRET),
        ("STOREFRONT_VNPAY_TMN_CODE", "TEST0001"),
        ("STOREFRONT_SHIPPING_TIMEOUT_MS", "200"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    CheckoutConfig::from_vars(&vars).unwrap()
}

async fn build(db: Database, shipping: ShippingBehavior) -> Harness {
    let clock = Arc::new(FixedClock::new(noon()));
    let state = Arc::new(AppState {
        db,
        catalog: Arc::new(catalog()),
        shipping: Arc::new(FakeShipping { behavior: shipping }),
        clock: clock.clone(),
        config: config(),
    });

    Harness {
        orders: OrderService::new(state.clone()),
        lifecycle: LifecycleService::new(state.clone()),
        payments: PaymentService::new(state.clone()),
        inventory: InventoryService::new(state.clone()),
        discounts: DiscountService::new(state.clone()),
        state,
        clock,
    }
}

/// In-memory database, 30 000 flat shipping.
pub async fn harness() -> Harness {
    harness_with(ShippingBehavior::Quote(Some(Money::from_major(30_000)))).await
}

pub async fn harness_with(shipping: ShippingBehavior) -> Harness {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    build(db, shipping).await
}

/// File-backed database with a multi-connection pool.
pub async fn file_harness(dir: &Path) -> Harness {
    let db = Database::new(DbConfig::new(dir.join("checkout.db")).max_connections(8))
        .await
        .unwrap();
    build(db, ShippingBehavior::Quote(Some(Money::from_major(30_000)))).await
}

impl Harness {
    pub async fn stock(&self, product_id: i64, quantity: i64) {
        self.inventory.stock_product(&admin(), product_id, quantity).await.unwrap();
    }

    pub async fn stock_level(&self, product_id: i64) -> i64 {
        self.inventory.stock_level(product_id).await.unwrap().quantity
    }

    /// SALE10: 10% off orders of at least 1 000 000, valid around noon.
    pub async fn sale10(&self) {
        self.discounts
            .create_code(
                &admin(),
                NewDiscountCode {
                    code: "SALE10".to_string(),
                    discount_percentage: 10,
                    min_order_value: Money::from_major(1_000_000),
                    valid_from: noon() - Duration::days(7),
                    valid_to: noon() + Duration::days(7),
                },
            )
            .await
            .unwrap();
    }
}

pub fn request(lines: &[(i64, i64)]) -> CheckoutRequest {
    CheckoutRequest {
        product_ids: lines.iter().map(|(id, _)| *id).collect(),
        quantities: lines.iter().map(|(_, qty)| *qty).collect(),
        address: "12 Nguyen Hue, District 1, Ho Chi Minh City".to_string(),
        phone_number: "0901234567".to_string(),
        carrier: "GHN".to_string(),
        discount_code: None,
        payment_method: None,
    }
}

/// A callback signed the way the gateway signs it.
pub fn signed_callback(payment_id: &str, amount: Money, response_code: &str, txn_no: &str) -> GatewayParams {
    let mut params = GatewayParams::new();
    params.insert("vnp_TxnRef".to_string(), payment_id.to_string());
    params.insert("vnp_Amount".to_string(), amount.minor_units().to_string());
    params.insert("vnp_ResponseCode".to_string(), response_code.to_string());
    params.insert("vnp_TransactionNo".to_string(), txn_no.to_string());
    params.insert("vnp_OrderInfo".to_string(), format!("Thanh toan don hang: {payment_id}"));
    params.insert("vnp_BankCode".to_string(), "NCB".to_string());

    let signature = gateway::sign(SECRET, &gateway::hash_payload(&params)).unwrap();
    params.insert(SECURE_HASH.to_string(), signature);
    params
}
