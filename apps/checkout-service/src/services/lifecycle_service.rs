//! Order status changes and record purges.
//!
//! ```text
//! update_status(CANCELLED) ──► cancel_order ──► PENDING → CANCELLED + release stock
//! update_status(SHIPPED | COMPLETED)          ──► status write only (elevated)
//! delete_order                                ──► purge, no restock (elevated)
//! ```
//!
//! Every status write is conditional on the status read beforehand, so a
//! concurrent change turns into `InvalidTransition` instead of a lost update.

use std::sync::Arc;

use tracing::info;

use storefront_core::order::ensure_transition;
use storefront_core::{Actor, CoreError, Order, OrderStatus};
use storefront_db::UnitOfWork;

use crate::error::{CheckoutError, CheckoutResult};
use crate::AppState;

/// Ledger reason for stock returned by a cancellation.
pub const RELEASE_REASON: &str = "order cancelled";

/// Lifecycle service.
pub struct LifecycleService {
    state: Arc<AppState>,
}

impl LifecycleService {
    /// Create a new lifecycle service.
    pub fn new(state: Arc<AppState>) -> Self {
        LifecycleService { state }
    }

    /// Cancels a PENDING order and puts its stock back.
    ///
    /// Allowed for the owner and for elevated actors.
    pub async fn cancel_order(&self, actor: &Actor, order_id: &str) -> CheckoutResult<Order> {
        let order = self.load(order_id).await?;

        if !actor.can_manage_order_of(&order.customer_id) {
            return Err(CheckoutError::forbidden(&actor.id, "cancel order"));
        }
        ensure_transition(order_id, order.status, OrderStatus::Cancelled)?;

        let db = &self.state.db;
        let now = self.state.clock.now();
        let mut uow = db.begin().await?;

        self.transition(&mut uow, order_id, order.status, OrderStatus::Cancelled).await?;

        for line in &order.lines {
            db.inventory()
                .release(&mut uow, line.product_id, line.quantity, RELEASE_REASON, &actor.id, now)
                .await?;
        }

        let cancelled = self.reload(&mut uow, order_id).await?;
        uow.commit().await?;

        info!(
            order_id = %order_id,
            actor_id = %actor.id,
            lines = cancelled.lines.len(),
            "Order cancelled and stock released"
        );
        Ok(cancelled)
    }

    /// Moves an order along the state machine.
    ///
    /// CANCELLED goes through [`cancel_order`](Self::cancel_order). Every
    /// other target needs an elevated actor.
    pub async fn update_status(
        &self,
        actor: &Actor,
        order_id: &str,
        status: OrderStatus,
    ) -> CheckoutResult<Order> {
        if status == OrderStatus::Cancelled {
            return self.cancel_order(actor, order_id).await;
        }

        if !actor.is_elevated() {
            return Err(CheckoutError::forbidden(&actor.id, format!("mark orders {status}")));
        }

        let order = self.load(order_id).await?;
        ensure_transition(order_id, order.status, status)?;

        let mut uow = self.state.db.begin().await?;
        self.transition(&mut uow, order_id, order.status, status).await?;
        let updated = self.reload(&mut uow, order_id).await?;
        uow.commit().await?;

        Ok(updated)
    }

    /// Purges an order with its lines, shipping info and payment.
    ///
    /// Stock is not restored and the adjustment log is left alone.
    pub async fn delete_order(&self, actor: &Actor, order_id: &str) -> CheckoutResult<()> {
        if !actor.is_elevated() {
            return Err(CheckoutError::forbidden(&actor.id, "delete orders"));
        }

        self.state.db.orders().delete(order_id).await?;
        info!(order_id = %order_id, actor_id = %actor.id, "Order purged");
        Ok(())
    }

    async fn load(&self, order_id: &str) -> CheckoutResult<Order> {
        self.state
            .db
            .orders()
            .get(order_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("Order", order_id))
    }

    async fn reload(&self, uow: &mut UnitOfWork, order_id: &str) -> CheckoutResult<Order> {
        self.state
            .db
            .orders()
            .get_in(uow, order_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("Order", order_id))
    }

    /// Conditional status write. On a lost race, reports the status that won.
    async fn transition(
        &self,
        uow: &mut UnitOfWork,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> CheckoutResult<()> {
        let now = self.state.clock.now();
        let moved = self.state.db.orders().transition(uow, order_id, from, to, now).await?;
        if moved {
            return Ok(());
        }

        let current = self.state.db.orders().get_in(uow, order_id).await?;
        match current {
            Some(current) => Err(CoreError::InvalidTransition {
                order_id: order_id.to_string(),
                from: current.status,
                to,
            }
            .into()),
            None => Err(CheckoutError::not_found("Order", order_id)),
        }
    }
}
