//! Stock administration: opening balances, deliveries and the ledger view.
//!
//! Reservations and releases are not exposed here; they only happen as
//! part of order creation and cancellation.

use std::sync::Arc;

use storefront_core::{Actor, InventoryAdjustment, InventoryRecord, ProductId};

use crate::error::{CheckoutError, CheckoutResult};
use crate::AppState;

/// Inventory service.
pub struct InventoryService {
    state: Arc<AppState>,
}

impl InventoryService {
    /// Create a new inventory service.
    pub fn new(state: Arc<AppState>) -> Self {
        InventoryService { state }
    }

    /// Opens the ledger for a product with `quantity` units on hand.
    pub async fn stock_product(
        &self,
        actor: &Actor,
        product_id: ProductId,
        quantity: i64,
    ) -> CheckoutResult<InventoryRecord> {
        self.require_elevated(actor, "stock products")?;

        let record = self
            .state
            .db
            .inventory()
            .create_record(product_id, quantity, &actor.id, self.state.clock.now())
            .await?;
        Ok(record)
    }

    /// Adds delivered stock.
    pub async fn restock(
        &self,
        actor: &Actor,
        product_id: ProductId,
        quantity: i64,
        reason: &str,
    ) -> CheckoutResult<InventoryRecord> {
        self.require_elevated(actor, "restock products")?;

        let record = self
            .state
            .db
            .inventory()
            .restock(product_id, quantity, reason, &actor.id, self.state.clock.now())
            .await?;
        Ok(record)
    }

    pub async fn stock_level(&self, product_id: ProductId) -> CheckoutResult<InventoryRecord> {
        self.state
            .db
            .inventory()
            .get(product_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("Inventory", product_id))
    }

    /// Every adjustment for a product, oldest first, including rejected
    /// reservations.
    pub async fn adjustment_history(
        &self,
        actor: &Actor,
        product_id: ProductId,
    ) -> CheckoutResult<Vec<InventoryAdjustment>> {
        self.require_elevated(actor, "read the stock ledger")?;
        Ok(self.state.db.inventory().history(product_id).await?)
    }

    fn require_elevated(&self, actor: &Actor, action: &str) -> CheckoutResult<()> {
        if actor.is_elevated() {
            Ok(())
        } else {
            Err(CheckoutError::forbidden(&actor.id, action))
        }
    }
}
