//! # Checkout Demo
//!
//! Walks one order through checkout, the payment gateway round trip and a
//! cancellation, against the configured SQLite database.
//!
//! ```text
//! seed stock + code ──► create_order ──► redirect URL ──► signed callback ──► PAID
//!                       create_order ──► cancel_order ──► stock restored
//! ```
//!
//! Set `STOREFRONT_DATABASE_PATH=:memory:` for a throwaway run.

use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use checkout_service::collaborators::{FlatRateShipping, InMemoryCatalog, SystemClock};
use checkout_service::services::{
    CheckoutRequest, DiscountService, InventoryService, LifecycleService, NewDiscountCode,
    OrderService, PaymentService,
};
use checkout_service::{AppState, CheckoutConfig, CheckoutResult, Clock, ErrorKind};
use storefront_core::gateway::{self, GatewayParams, SECURE_HASH};
use storefront_core::{Actor, Money, Product, Role};
use storefront_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("Starting checkout demo...");

    let config = CheckoutConfig::load().context("loading configuration")?;
    info!(
        database = %config.database_path.display(),
        shipping_timeout = ?config.shipping_timeout,
        "Configuration loaded"
    );

    let db_config = DbConfig::for_path(&config.database_path).max_connections(config.max_connections);
    let db = Database::new(db_config).await.context("opening database")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let catalog = InMemoryCatalog::new([
        Product {
            id: 7,
            name: "Ceramic Mug".to_string(),
            selling_price: Money::from_major(500_000),
            promotion: None,
        },
        Product {
            id: 9,
            name: "Pour-over Kettle".to_string(),
            selling_price: Money::from_major(1_200_000),
            promotion: None,
        },
    ]);
    let shipping = FlatRateShipping::new(clock.clone()).carrier("GHN", Money::from_major(30_000), 3);

    let state = Arc::new(AppState {
        db,
        catalog: Arc::new(catalog),
        shipping: Arc::new(shipping),
        clock: clock.clone(),
        config,
    });

    let orders = OrderService::new(state.clone());
    let lifecycle = LifecycleService::new(state.clone());
    let payments = PaymentService::new(state.clone());
    let inventory = InventoryService::new(state.clone());
    let discounts = DiscountService::new(state.clone());

    let admin = Actor::new("admin-1", [Role::Admin]);
    let customer = Actor::customer("customer-1");

    // -------------------------------------------------------------------------
    // Seed
    // -------------------------------------------------------------------------
    for (product_id, quantity) in [(7, 50), (9, 20)] {
        tolerate_existing(inventory.stock_product(&admin, product_id, quantity).await)?;
    }

    let now = clock.now();
    tolerate_existing(
        discounts
            .create_code(
                &admin,
                NewDiscountCode {
                    code: "SALE10".to_string(),
                    discount_percentage: 10,
                    min_order_value: Money::from_major(1_000_000),
                    valid_from: now - Duration::days(1),
                    valid_to: now + Duration::days(30),
                },
            )
            .await,
    )?;

    // -------------------------------------------------------------------------
    // Checkout and online payment
    // -------------------------------------------------------------------------
    let request = CheckoutRequest {
        product_ids: vec![7, 9],
        quantities: vec![2, 1],
        address: "12 Nguyen Hue, District 1, Ho Chi Minh City".to_string(),
        phone_number: "0901234567".to_string(),
        carrier: "GHN".to_string(),
        discount_code: Some("SALE10".to_string()),
        payment_method: Some("vnpay".to_string()),
    };

    let order = match orders.create_order(&customer, request.clone()).await {
        Ok(order) => order,
        Err(e) if e.kind() == ErrorKind::ResourceConflict => {
            warn!(error = %e, "SALE10 already used, checking out without it");
            let request = CheckoutRequest {
                discount_code: None,
                ..request
            };
            orders.create_order(&customer, request).await?
        }
        Err(e) => return Err(e.into()),
    };
    info!(
        order_id = %order.id,
        subtotal = %order.subtotal,
        discount = %order.discount_amount,
        total = %order.total_price,
        "Order placed"
    );

    let payment = payments.get_payment_by_order(&customer, &order.id).await?;
    let url = payments
        .build_payment_redirect(&payment.id, payment.amount, Some("203.0.113.7"))
        .await?;
    info!(%url, "Redirecting customer to gateway");

    let mut callback = GatewayParams::new();
    callback.insert("vnp_TxnRef".to_string(), payment.id.clone());
    callback.insert("vnp_Amount".to_string(), payment.amount.minor_units().to_string());
    callback.insert("vnp_ResponseCode".to_string(), "00".to_string());
    callback.insert("vnp_TransactionStatus".to_string(), "00".to_string());
    callback.insert("vnp_TransactionNo".to_string(), "14123456".to_string());
    let signature = gateway::sign(
        &state.config.gateway.hash_secret,
        &gateway::hash_payload(&callback),
    )?;
    callback.insert(SECURE_HASH.to_string(), signature);

    let paid = payments.handle_payment_callback(&callback).await?;
    let replayed = payments.handle_payment_callback(&callback).await?;
    info!(paid, replayed, "Gateway callback delivered twice");

    // -------------------------------------------------------------------------
    // Cash on delivery, then cancelled
    // -------------------------------------------------------------------------
    let cod = orders
        .create_order(
            &customer,
            CheckoutRequest {
                product_ids: vec![9],
                quantities: vec![3],
                address: "12 Nguyen Hue, District 1, Ho Chi Minh City".to_string(),
                phone_number: "0901234567".to_string(),
                carrier: "GHN".to_string(),
                discount_code: None,
                payment_method: None,
            },
        )
        .await?;
    let before = inventory.stock_level(9).await?.quantity;
    let cancelled = lifecycle.cancel_order(&customer, &cod.id).await?;
    let after = inventory.stock_level(9).await?.quantity;
    info!(order_id = %cancelled.id, status = %cancelled.status, before, after, "COD order cancelled");

    for adjustment in inventory.adjustment_history(&admin, 9).await? {
        info!(
            delta = adjustment.delta,
            reason = %adjustment.reason,
            applied = adjustment.applied,
            "Ledger"
        );
    }

    state.db.close().await;
    info!(elapsed_ms = (Utc::now() - now).num_milliseconds(), "Demo finished");
    Ok(())
}

/// Seeding a database that already has the rows is fine.
fn tolerate_existing<T>(result: CheckoutResult<T>) -> CheckoutResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::ResourceConflict => {
            info!(error = %e, "Seed data already present");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
