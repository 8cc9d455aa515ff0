//! Order creation and lookup.
//!
//! ## Checkout Flow
//! ```text
//! CheckoutRequest
//!      │
//!      ├─► validate cart, shipping fields, payment method, code   (no I/O)
//!      ├─► catalog lookup + pricing at selling price              (no lock)
//!      ├─► promotion conflict check                               (no lock)
//!      ├─► shipping quote under timeout                           (no lock)
//!      │
//!      ▼  ┌────────────────────── one unit of work ──────────────────────┐
//!         │ reserve each line ─► claim code ─► insert order ─► payment   │
//!         └──────────────────────────── commit ──────────────────────────┘
//! ```
//!
//! The quote is fetched before the transaction opens, so no write lock is
//! ever held across a network call.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use storefront_core::discount::ensure_no_promotion_conflict;
use storefront_core::order::{price_line, subtotal, OrderTotals};
use storefront_core::validation::{
    normalize_discount_code, parse_payment_method, validate_cart, validate_shipping_input,
};
use storefront_core::{
    new_id, Actor, CoreError, Order, OrderStatus, Payment, PaymentStatus, Product, ShippingInfo,
};
use storefront_db::{DbError, OrderFilter};

use crate::collaborators::ShippingQuote;
use crate::error::{CheckoutError, CheckoutResult};
use crate::AppState;

/// Ledger reason for stock taken by a new order.
pub const RESERVE_REASON: &str = "order placed";

/// A customer's checkout submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Parallel to `quantities`.
    pub product_ids: Vec<i64>,
    pub quantities: Vec<i64>,
    pub address: String,
    pub phone_number: String,
    pub carrier: String,
    /// Blank counts as absent.
    pub discount_code: Option<String>,
    /// COD or VNPAY, case-insensitive. Absent means COD.
    pub payment_method: Option<String>,
}

/// Order service.
pub struct OrderService {
    state: Arc<AppState>,
}

impl OrderService {
    /// Create a new order service.
    pub fn new(state: Arc<AppState>) -> Self {
        OrderService { state }
    }

    /// Places an order for `actor`.
    ///
    /// Either the stock reservations, the discount claim, the order and its
    /// payment all commit, or nothing changes.
    pub async fn create_order(&self, actor: &Actor, request: CheckoutRequest) -> CheckoutResult<Order> {
        let cart = validate_cart(&request.product_ids, &request.quantities)?;
        validate_shipping_input(&request.address, &request.phone_number, &request.carrier)?;
        let method = parse_payment_method(request.payment_method.as_deref())?;
        let code = normalize_discount_code(request.discount_code.as_deref());

        let now = self.state.clock.now();
        let order_id = new_id();

        let mut products: Vec<Product> = Vec::with_capacity(cart.len());
        for line in &cart {
            let product = self
                .state
                .catalog
                .get_product(line.product_id)
                .await
                .ok_or_else(|| CheckoutError::not_found("Product", line.product_id))?;
            products.push(product);
        }

        let lines: Vec<_> = cart
            .iter()
            .zip(&products)
            .map(|(line, product)| price_line(line, product))
            .collect();
        let subtotal = subtotal(&lines)?;

        if let Some(code) = &code {
            ensure_no_promotion_conflict(code, &products, now)?;
        }

        let quote = self.quote(&request.address, &request.carrier).await?;

        // ---------------------------------------------------------------------
        // Unit of work
        // ---------------------------------------------------------------------
        let db = &self.state.db;
        let mut uow = db.begin().await?;

        for line in &cart {
            let reserved = db
                .inventory()
                .reserve(&mut uow, line.product_id, line.quantity, RESERVE_REASON, &actor.id, now)
                .await;

            match reserved {
                Ok(()) => {}
                Err(DbError::Core(CoreError::InsufficientStock { product_id, available, requested })) => {
                    uow.rollback().await?;
                    if let Err(e) = db
                        .inventory()
                        .record_rejection(product_id, requested, RESERVE_REASON, &actor.id, now)
                        .await
                    {
                        warn!(product_id, error = %e, "Failed to log rejected reservation");
                    }
                    return Err(CoreError::InsufficientStock { product_id, available, requested }.into());
                }
                Err(e) => return Err(e.into()),
            }
        }

        let claimed = match &code {
            Some(code) => Some(db.discounts().claim(&mut uow, code, subtotal, now).await?),
            None => None,
        };

        let totals = OrderTotals::compute(
            &lines,
            claimed.as_ref().map(|c| c.amount).unwrap_or_default(),
            quote.fee,
        )?;

        let order = Order {
            id: order_id,
            customer_id: actor.id.clone(),
            status: OrderStatus::Pending,
            lines,
            shipping: ShippingInfo {
                address: request.address.trim().to_string(),
                phone_number: request.phone_number.trim().to_string(),
                carrier: request.carrier.trim().to_string(),
                fee: totals.shipping_fee,
                estimated_delivery: quote.estimated_delivery,
            },
            subtotal: totals.subtotal,
            discount_amount: totals.discount_amount,
            shipping_fee: totals.shipping_fee,
            total_price: totals.total_price,
            applied_discount_id: claimed.map(|c| c.discount_id),
            created_at: now,
            updated_at: now,
        };

        let payment = Payment {
            id: new_id(),
            order_id: order.id.clone(),
            method,
            status: PaymentStatus::Pending,
            amount: order.total_price,
            transaction_id: None,
            created_at: now,
            updated_at: now,
        };

        db.orders().insert(&mut uow, &order).await?;
        db.payments().insert(&mut uow, &payment).await?;
        uow.commit().await?;

        info!(
            order_id = %order.id,
            customer_id = %order.customer_id,
            lines = order.lines.len(),
            total = %order.total_price,
            method = %method,
            "Order created"
        );
        Ok(order)
    }

    /// Fetches an order its owner or an elevated actor may see.
    pub async fn get_order(&self, actor: &Actor, order_id: &str) -> CheckoutResult<Order> {
        let order = self
            .state
            .db
            .orders()
            .get(order_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("Order", order_id))?;

        if !actor.can_manage_order_of(&order.customer_id) {
            return Err(CheckoutError::forbidden(&actor.id, "view order"));
        }
        Ok(order)
    }

    /// Lists orders, newest first. Customers only ever see their own.
    pub async fn list_orders(&self, actor: &Actor, filter: OrderFilter) -> CheckoutResult<Vec<Order>> {
        let filter = if actor.is_elevated() {
            filter
        } else {
            filter.customer(actor.id.clone())
        };

        let orders = self.state.db.orders().list(&filter).await?;
        debug!(actor_id = %actor.id, count = orders.len(), "Orders listed");
        Ok(orders)
    }

    async fn quote(&self, address: &str, carrier: &str) -> CheckoutResult<ShippingQuote> {
        let timeout = self.state.config.shipping_timeout;

        match tokio::time::timeout(timeout, self.state.shipping.estimate(address, carrier)).await {
            Ok(Ok(quote)) => Ok(quote),
            Ok(Err(e)) => {
                warn!(carrier, error = %e, "Shipping quote failed");
                Err(CheckoutError::Upstream(e.to_string()))
            }
            Err(_) => {
                warn!(carrier, ?timeout, "Shipping quote timed out");
                Err(CheckoutError::Upstream(format!(
                    "carrier '{carrier}' did not answer within {timeout:?}"
                )))
            }
        }
    }
}
