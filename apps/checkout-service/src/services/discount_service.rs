//! Discount code registration.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use storefront_core::validation::normalize_discount_code;
use storefront_core::{new_id, Actor, DiscountCode, Money, ValidationError};

use crate::error::{CheckoutError, CheckoutResult};
use crate::AppState;

/// A code to register. Codes start unused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDiscountCode {
    pub code: String,
    pub discount_percentage: u32,
    pub min_order_value: Money,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
}

/// Discount service.
pub struct DiscountService {
    state: Arc<AppState>,
}

impl DiscountService {
    /// Create a new discount service.
    pub fn new(state: Arc<AppState>) -> Self {
        DiscountService { state }
    }

    pub async fn create_code(&self, actor: &Actor, new: NewDiscountCode) -> CheckoutResult<DiscountCode> {
        if !actor.is_elevated() {
            return Err(CheckoutError::forbidden(&actor.id, "create discount codes"));
        }

        let code = normalize_discount_code(Some(new.code.as_str())).ok_or_else(|| ValidationError::Required {
            field: "code".to_string(),
        })?;

        if new.valid_to < new.valid_from {
            return Err(ValidationError::InvalidFormat {
                field: "valid_to".to_string(),
                reason: "must not precede valid_from".to_string(),
            }
            .into());
        }

        let discount = DiscountCode {
            id: new_id(),
            code,
            discount_percentage: new.discount_percentage,
            min_order_value: new.min_order_value,
            valid_from: new.valid_from,
            valid_to: new.valid_to,
            used: false,
        };

        self.state.db.discounts().create_code(&discount).await?;
        info!(code = %discount.code, actor_id = %actor.id, "Discount code registered");
        Ok(discount)
    }

    pub async fn find_code(&self, actor: &Actor, code: &str) -> CheckoutResult<DiscountCode> {
        if !actor.is_elevated() {
            return Err(CheckoutError::forbidden(&actor.id, "view discount codes"));
        }

        self.state
            .db
            .discounts()
            .find_by_code(code.trim())
            .await?
            .ok_or_else(|| CheckoutError::not_found("DiscountCode", code))
    }
}
