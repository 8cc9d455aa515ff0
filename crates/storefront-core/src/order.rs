//! # Order Rules
//!
//! Pricing and the order state machine, with no I/O.
//!
//! ## Pricing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cart line (product 7, qty 2) ──► unit_price = product.selling_price    │
//! │                                                                         │
//! │  subtotal      = Σ unit_price × qty                                     │
//! │  discount      = floor(subtotal × pct / 100)   (0 without a code)       │
//! │  shipping_fee  = quote.fee                     (0 when absent)          │
//! │  total_price   = subtotal − discount + shipping_fee                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every sum is checked. A total that does not fit in i64 minor units fails
//! with `AmountOverflow`.
//!
//! The promotional price is never captured on an order line. Orders store
//! the base selling price even while a promotion is running.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CartLine, OrderLine, OrderStatus, Product};

// =============================================================================
// Pricing
// =============================================================================

/// Prices a cart line at the product's base selling price.
pub fn price_line(line: &CartLine, product: &Product) -> OrderLine {
    OrderLine {
        product_id: line.product_id,
        quantity: line.quantity,
        unit_price: product.selling_price,
    }
}

/// Computed order amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount_amount: Money,
    pub shipping_fee: Money,
    pub total_price: Money,
}

impl OrderTotals {
    /// Sums the lines and applies the discount and fee.
    ///
    /// ```rust
    /// use storefront_core::order::OrderTotals;
    /// use storefront_core::{Money, OrderLine};
    ///
    /// let lines = vec![
    ///     OrderLine { product_id: 7, quantity: 2, unit_price: Money::from_major(500_000) },
    ///     OrderLine { product_id: 9, quantity: 1, unit_price: Money::from_major(1_200_000) },
    /// ];
    /// let totals = OrderTotals::compute(&lines, Money::zero(), Some(Money::from_major(30_000))).unwrap();
    /// assert_eq!(totals.subtotal, Money::from_major(2_200_000));
    /// assert_eq!(totals.total_price, Money::from_major(2_230_000));
    /// ```
    pub fn compute(
        lines: &[OrderLine],
        discount_amount: Money,
        shipping_fee: Option<Money>,
    ) -> CoreResult<Self> {
        let subtotal = subtotal(lines)?;
        let shipping_fee = shipping_fee.unwrap_or_default();

        let total_price = subtotal
            .checked_sub(discount_amount)
            .and_then(|t| t.checked_add(shipping_fee))
            .ok_or(CoreError::AmountOverflow { what: "order total" })?;

        Ok(OrderTotals {
            subtotal,
            discount_amount,
            shipping_fee,
            total_price,
        })
    }
}

/// Σ unit_price × quantity.
pub fn subtotal(lines: &[OrderLine]) -> CoreResult<Money> {
    lines
        .iter()
        .try_fold(Money::zero(), |acc, line| acc.checked_add(line.line_total()?))
        .ok_or(CoreError::AmountOverflow { what: "subtotal" })
}

// =============================================================================
// State Machine
// =============================================================================

/// Whether `from → to` is a legal move.
///
/// | from      | to                              |
/// |-----------|---------------------------------|
/// | PENDING   | SHIPPED, COMPLETED, CANCELLED   |
/// | SHIPPED   | COMPLETED                       |
/// | COMPLETED | (terminal)                      |
/// | CANCELLED | (terminal)                      |
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;

    matches!(
        (from, to),
        (Pending, Shipped) | (Pending, Completed) | (Pending, Cancelled) | (Shipped, Completed)
    )
}

/// Errors with `InvalidTransition` when the move is illegal.
pub fn ensure_transition(order_id: &str, from: OrderStatus, to: OrderStatus) -> CoreResult<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            order_id: order_id.to_string(),
            from,
            to,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    fn line(product_id: i64, quantity: i64, major: i64) -> OrderLine {
        OrderLine {
            product_id,
            quantity,
            unit_price: Money::from_major(major),
        }
    }

    #[test]
    fn test_totals_without_discount() {
        let lines = vec![line(7, 2, 500_000), line(9, 1, 1_200_000)];
        let totals = OrderTotals::compute(&lines, Money::zero(), Some(Money::from_major(30_000))).unwrap();

        assert_eq!(totals.subtotal, Money::from_major(2_200_000));
        assert_eq!(totals.total_price, Money::from_major(2_230_000));
    }

    #[test]
    fn test_totals_with_discount() {
        let lines = vec![line(7, 2, 500_000), line(9, 1, 1_200_000)];
        let discount = Money::from_major(2_200_000).percentage_floor(10);
        let totals = OrderTotals::compute(&lines, discount, Some(Money::from_major(30_000))).unwrap();

        assert_eq!(totals.discount_amount, Money::from_major(220_000));
        assert_eq!(totals.total_price, Money::from_major(2_010_000));
    }

    #[test]
    fn test_missing_fee_counts_as_zero() {
        let totals = OrderTotals::compute(&[line(7, 1, 500_000)], Money::zero(), None).unwrap();
        assert_eq!(totals.shipping_fee, Money::zero());
        assert_eq!(totals.total_price, Money::from_major(500_000));
    }

    #[test]
    fn test_overflowing_amounts_are_errors() {
        let huge = OrderLine {
            product_id: 7,
            quantity: 3,
            unit_price: Money::from_minor(i64::MAX / 2),
        };
        assert!(matches!(
            subtotal(&[huge]),
            Err(CoreError::AmountOverflow { what: "subtotal" })
        ));

        let lines = vec![line(7, 1, 500_000)];
        assert!(matches!(
            OrderTotals::compute(&lines, Money::zero(), Some(Money::from_minor(i64::MAX))),
            Err(CoreError::AmountOverflow { what: "order total" })
        ));
    }

    #[test]
    fn test_price_line_uses_selling_price_not_promotion() {
        use crate::types::{CartLine, Product, Promotion};
        use chrono::{Duration, Utc};

        let now = Utc::now();
        let product = Product {
            id: 7,
            name: "Phone".to_string(),
            selling_price: Money::from_major(500_000),
            promotion: Some(Promotion {
                price: Money::from_major(400_000),
                starts_at: now - Duration::hours(1),
                ends_at: now + Duration::hours(1),
            }),
        };
        let priced = price_line(&CartLine { product_id: 7, quantity: 2 }, &product);
        assert_eq!(priced.unit_price, Money::from_major(500_000));
        assert_eq!(priced.line_total(), Some(Money::from_major(1_000_000)));
    }

    #[test]
    fn test_transitions_from_pending() {
        assert!(can_transition(Pending, Shipped));
        assert!(can_transition(Pending, Completed));
        assert!(can_transition(Pending, Cancelled));
        assert!(!can_transition(Pending, Pending));
    }

    #[test]
    fn test_shipped_orders_cannot_be_cancelled() {
        assert!(can_transition(Shipped, Completed));
        assert!(matches!(
            ensure_transition("o-1", Shipped, Cancelled),
            Err(CoreError::InvalidTransition { from: Shipped, to: Cancelled, .. })
        ));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for to in [Pending, Shipped, Completed, Cancelled] {
            assert!(!can_transition(Completed, to));
            assert!(!can_transition(Cancelled, to));
        }
    }
}
