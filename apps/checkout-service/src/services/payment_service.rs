//! Payment redirects, gateway callbacks and manual overrides.
//!
//! ## Redirect
//! ```text
//! (payment_id, amount) ──► amount > 0? ──► payment exists? ──► amount matches? ──► signed URL
//! ```
//!
//! ## Callback Handling
//! ```text
//! params ──► verify signature ──✗──► IntegrityFailure
//!               │ ✓
//!               ▼
//!          parse report ──► load payment ──► amount matches? ──✗──► IntegrityFailure
//!                                                │ ✓
//!                                                ▼
//!                         PAID already? ──► no-op, accepted
//!                         PENDING       ──► settle PAID / FAILED + transaction no.
//! ```
//!
//! The gateway may deliver the same callback more than once; only the first
//! one changes anything.

use std::sync::Arc;

use tracing::{info, warn};

use storefront_core::gateway::{self, CallbackOutcome, CallbackReport, GatewayParams};
use storefront_core::validation::validate_payment_amount;
use storefront_core::{Actor, Money, Payment, PaymentStatus, ValidationError};

use crate::error::{CheckoutError, CheckoutResult};
use crate::AppState;

/// Payment service.
pub struct PaymentService {
    state: Arc<AppState>,
}

impl PaymentService {
    /// Create a new payment service.
    pub fn new(state: Arc<AppState>) -> Self {
        PaymentService { state }
    }

    /// Builds the signed gateway URL the customer is sent to.
    ///
    /// The payment must exist and `amount` must be the amount it was
    /// recorded with.
    pub async fn build_payment_redirect(
        &self,
        payment_id: &str,
        amount: Money,
        client_ip: Option<&str>,
    ) -> CheckoutResult<String> {
        validate_payment_amount(amount)?;

        let payment = self
            .state
            .db
            .payments()
            .get(payment_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("Payment", payment_id))?;

        if amount != payment.amount {
            warn!(payment_id, expected = %payment.amount, requested = %amount, "Redirect amount mismatch");
            return Err(ValidationError::InvalidFormat {
                field: "amount".to_string(),
                reason: format!("does not match the amount of payment {payment_id}"),
            }
            .into());
        }

        let url = gateway::build_redirect_url(
            &self.state.config.gateway,
            &payment.id,
            payment.amount,
            client_ip,
            self.state.clock.now(),
        )?;

        info!(payment_id, %amount, "Payment redirect built");
        Ok(url)
    }

    /// Applies a gateway callback.
    ///
    /// Returns true when the payment ends up PAID (including a repeated
    /// callback for a payment that is already PAID) and false when it was
    /// recorded as FAILED.
    pub async fn handle_payment_callback(&self, params: &GatewayParams) -> CheckoutResult<bool> {
        if !gateway::verify_callback(&self.state.config.gateway.hash_secret, params) {
            warn!(
                txn_ref = params.get("vnp_TxnRef").map(String::as_str).unwrap_or(""),
                "Callback signature rejected"
            );
            return Err(CheckoutError::Integrity("invalid callback signature".to_string()));
        }

        let report = CallbackReport::from_params(params)?;
        let payments = self.state.db.payments();

        let payment = payments
            .get(&report.payment_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("Payment", &report.payment_id))?;

        if report.amount != payment.amount {
            warn!(
                payment_id = %payment.id,
                expected = %payment.amount,
                reported = %report.amount,
                "Callback amount mismatch"
            );
            return Err(CheckoutError::Integrity(format!(
                "amount mismatch for payment {}",
                payment.id
            )));
        }

        if payment.status != PaymentStatus::Pending {
            if payment.status == PaymentStatus::Paid {
                info!(payment_id = %payment.id, "Duplicate callback for paid payment");
            } else {
                warn!(payment_id = %payment.id, status = %payment.status, "Callback for settled payment ignored");
            }
            return Ok(payment.status == PaymentStatus::Paid);
        }

        let status = match report.outcome {
            CallbackOutcome::Paid => PaymentStatus::Paid,
            CallbackOutcome::Failed => PaymentStatus::Failed,
        };

        let mut uow = self.state.db.begin().await?;
        let settled = payments
            .settle(
                &mut uow,
                &payment.id,
                status,
                report.transaction_no.as_deref(),
                self.state.clock.now(),
            )
            .await?;

        if !settled {
            // Another delivery of the same callback got there first.
            let current = payments.get_in(&mut uow, &payment.id).await?;
            uow.rollback().await?;
            return Ok(current.map(|p| p.status) == Some(PaymentStatus::Paid));
        }

        uow.commit().await?;

        info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            response_code = %report.response_code,
            %status,
            "Payment callback applied"
        );
        Ok(status == PaymentStatus::Paid)
    }

    /// Sets a payment's status by hand, e.g. AWAITING_DELIVERY for COD.
    pub async fn update_payment_status(
        &self,
        actor: &Actor,
        payment_id: &str,
        status: PaymentStatus,
        transaction_id: Option<&str>,
    ) -> CheckoutResult<Payment> {
        if !actor.is_elevated() {
            return Err(CheckoutError::forbidden(&actor.id, "override payment status"));
        }

        let payment = self
            .state
            .db
            .payments()
            .override_status(payment_id, status, transaction_id, self.state.clock.now())
            .await?;

        info!(payment_id, actor_id = %actor.id, %status, "Manual payment override");
        Ok(payment)
    }

    /// The payment of an order its owner or an elevated actor may see.
    pub async fn get_payment_by_order(&self, actor: &Actor, order_id: &str) -> CheckoutResult<Payment> {
        let db = &self.state.db;

        let order = db
            .orders()
            .get(order_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("Order", order_id))?;

        if !actor.can_manage_order_of(&order.customer_id) {
            return Err(CheckoutError::forbidden(&actor.id, "view payment"));
        }

        db.payments()
            .get_by_order(order_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("Payment", order_id))
    }

    /// Looks a payment up by gateway transaction number. Elevated only.
    pub async fn get_payment_by_transaction(
        &self,
        actor: &Actor,
        transaction_id: &str,
    ) -> CheckoutResult<Payment> {
        if !actor.is_elevated() {
            return Err(CheckoutError::forbidden(&actor.id, "search payments"));
        }

        self.state
            .db
            .payments()
            .get_by_transaction(transaction_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("Payment", transaction_id))
    }
}
