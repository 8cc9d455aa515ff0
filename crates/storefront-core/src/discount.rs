//! # Discount Rules
//!
//! Pure evaluation of a discount code against a candidate subtotal.
//!
//! ## Check Order
//! ```text
//! code lookup ──► used? ──► now < valid_from? ──► now > valid_to? ──► subtotal < min?
//!  UnknownCode    AlreadyUsed   NotYetValid          Expired           BelowMinimum
//!                                                                          │
//!                                                        floor(subtotal × pct / 100)
//! ```
//!
//! Consumption (flipping `used`) is not done here; it is an atomic
//! check-and-set in the database layer, inside the order's unit of work.

use chrono::{DateTime, Utc};

use crate::error::DiscountError;
use crate::money::Money;
use crate::types::{DiscountCode, Product, ProductId};

/// Checks a code and returns the discount amount for `subtotal`.
///
/// ## Example
/// ```rust
/// use chrono::{Duration, Utc};
/// use storefront_core::{discount, DiscountCode, Money};
///
/// let now = Utc::now();
/// let code = DiscountCode {
///     id: "d1".into(),
///     code: "SALE10".into(),
///     discount_percentage: 10,
///     min_order_value: Money::from_major(1_000_000),
///     valid_from: now - Duration::days(1),
///     valid_to: now + Duration::days(1),
///     used: false,
/// };
///
/// let off = discount::evaluate(&code, Money::from_major(2_200_000), now).unwrap();
/// assert_eq!(off, Money::from_major(220_000));
/// ```
pub fn evaluate(
    code: &DiscountCode,
    subtotal: Money,
    now: DateTime<Utc>,
) -> Result<Money, DiscountError> {
    if code.used {
        return Err(DiscountError::AlreadyUsed(code.code.clone()));
    }

    if now < code.valid_from {
        return Err(DiscountError::NotYetValid {
            code: code.code.clone(),
            valid_from: code.valid_from,
        });
    }

    if now > code.valid_to {
        return Err(DiscountError::Expired {
            code: code.code.clone(),
            valid_to: code.valid_to,
        });
    }

    if subtotal < code.min_order_value {
        return Err(DiscountError::BelowMinimum {
            code: code.code.clone(),
            minimum: code.min_order_value,
            subtotal,
        });
    }

    Ok(subtotal.percentage_floor(code.discount_percentage))
}

/// Returns the first product (in cart order) whose own promotion is running.
pub fn find_promotion_conflict<'a, I>(products: I, now: DateTime<Utc>) -> Option<ProductId>
where
    I: IntoIterator<Item = &'a Product>,
{
    products
        .into_iter()
        .find(|product| product.promotion_active(now))
        .map(|product| product.id)
}

/// Rejects `code` when any cart product is under promotion.
pub fn ensure_no_promotion_conflict<'a, I>(
    code: &str,
    products: I,
    now: DateTime<Utc>,
) -> Result<(), DiscountError>
where
    I: IntoIterator<Item = &'a Product>,
{
    match find_promotion_conflict(products, now) {
        Some(product_id) => Err(DiscountError::ConflictingPromotion {
            code: code.to_string(),
            product_id,
        }),
        None => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Promotion;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn sale10() -> DiscountCode {
        DiscountCode {
            id: "d-1".to_string(),
            code: "SALE10".to_string(),
            discount_percentage: 10,
            min_order_value: Money::from_major(1_000_000),
            valid_from: now() - Duration::days(7),
            valid_to: now() + Duration::days(7),
            used: false,
        }
    }

    fn product(id: ProductId, promo: Option<(i64, i64)>) -> Product {
        Product {
            id,
            name: format!("Product {id}"),
            selling_price: Money::from_major(500_000),
            promotion: promo.map(|(start_h, end_h)| Promotion {
                price: Money::from_major(450_000),
                starts_at: now() + Duration::hours(start_h),
                ends_at: now() + Duration::hours(end_h),
            }),
        }
    }

    #[test]
    fn test_valid_code_yields_floor_percentage() {
        let off = evaluate(&sale10(), Money::from_major(2_200_000), now()).unwrap();
        assert_eq!(off, Money::from_major(220_000));

        let off = evaluate(&sale10(), Money::from_minor(100_000_099), now()).unwrap();
        assert_eq!(off.minor_units(), 10_000_009);
    }

    #[test]
    fn test_used_code_is_rejected_first() {
        let mut code = sale10();
        code.used = true;
        code.valid_to = now() - Duration::days(1);
        assert_eq!(
            evaluate(&code, Money::from_major(2_200_000), now()),
            Err(DiscountError::AlreadyUsed("SALE10".to_string()))
        );
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let mut code = sale10();
        code.valid_from = now();
        code.valid_to = now();
        assert!(evaluate(&code, Money::from_major(2_000_000), now()).is_ok());

        let early = now() - Duration::seconds(1);
        assert!(matches!(
            evaluate(&code, Money::from_major(2_000_000), early),
            Err(DiscountError::NotYetValid { .. })
        ));

        let late = now() + Duration::seconds(1);
        assert!(matches!(
            evaluate(&code, Money::from_major(2_000_000), late),
            Err(DiscountError::Expired { .. })
        ));
    }

    #[test]
    fn test_minimum_is_inclusive() {
        assert!(evaluate(&sale10(), Money::from_major(1_000_000), now()).is_ok());
        assert!(matches!(
            evaluate(&sale10(), Money::from_major(999_999), now()),
            Err(DiscountError::BelowMinimum { .. })
        ));
    }

    #[test]
    fn test_promotion_conflict_detects_running_promotions_only() {
        let running = product(9, Some((-1, 1)));
        let upcoming = product(8, Some((1, 2)));
        let plain = product(7, None);

        assert_eq!(find_promotion_conflict([&plain, &upcoming], now()), None);
        assert_eq!(find_promotion_conflict([&plain, &running], now()), Some(9));
        assert!(matches!(
            ensure_no_promotion_conflict("SALE10", [&plain, &running], now()),
            Err(DiscountError::ConflictingPromotion { product_id: 9, .. })
        ));
    }
}
