//! # Validation Module
//!
//! Input validation for checkout requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (HTTP handler, UI)                                    │
//! │  └── Deserialization, presence of fields                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Cart shape (parallel lists, positive quantities)                  │
//! │  ├── Shipping input, payment method, discount code normalization       │
//! │  └── Runs BEFORE any inventory or discount mutation                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity >= 0)                                             │
//! │  └── UNIQUE / FOREIGN KEY constraints                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use storefront_core::validation::{parse_payment_method, validate_cart};
//! use storefront_core::PaymentMethod;
//!
//! let lines = validate_cart(&[7, 9], &[2, 1]).unwrap();
//! assert_eq!(lines.len(), 2);
//!
//! assert_eq!(parse_payment_method(None).unwrap(), PaymentMethod::Cod);
//! assert!(parse_payment_method(Some("bitcoin")).is_err());
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{CartLine, PaymentMethod, ProductId};
use crate::{MAX_CART_LINES, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_ADDRESS_LEN: usize = 500;
const MAX_CARRIER_LEN: usize = 100;
const MAX_REASON_LEN: usize = 200;

// =============================================================================
// Cart
// =============================================================================

/// Zips parallel product-id and quantity lists into cart lines.
///
/// ## Rules
/// - Both lists have the same length (`MismatchedLineCounts` otherwise)
/// - At least one line, at most `MAX_CART_LINES`
/// - Every quantity passes [`validate_quantity`]
///
/// The same product may appear on several lines; each line reserves
/// independently.
pub fn validate_cart(product_ids: &[ProductId], quantities: &[i64]) -> CoreResult<Vec<CartLine>> {
    if product_ids.len() != quantities.len() {
        return Err(CoreError::MismatchedLineCounts {
            products: product_ids.len(),
            quantities: quantities.len(),
        });
    }

    if product_ids.is_empty() {
        return Err(ValidationError::Required {
            field: "cart".to_string(),
        }
        .into());
    }

    if product_ids.len() > MAX_CART_LINES {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 1,
            max: MAX_CART_LINES as i64,
        }
        .into());
    }

    product_ids
        .iter()
        .zip(quantities)
        .map(|(&product_id, &quantity)| -> CoreResult<CartLine> {
            validate_quantity(quantity)?;
            Ok(CartLine {
                product_id,
                quantity,
            })
        })
        .collect()
}

/// Validates a line or ledger quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed `MAX_ITEM_QUANTITY`
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

// =============================================================================
// Shipping
// =============================================================================

/// Validates the delivery fields of a checkout request.
pub fn validate_shipping_input(address: &str, phone: &str, carrier: &str) -> ValidationResult<()> {
    require_text("address", address, MAX_ADDRESS_LEN)?;
    validate_phone_number(phone)?;
    require_text("carrier", carrier, MAX_CARRIER_LEN)?;
    Ok(())
}

/// Validates a phone number.
///
/// ## Rules
/// - Optional leading `+`, then 8 to 15 digits
///
/// ```rust
/// use storefront_core::validation::validate_phone_number;
///
/// assert!(validate_phone_number("0901234567").is_ok());
/// assert!(validate_phone_number("+84901234567").is_ok());
/// assert!(validate_phone_number("call me").is_err());
/// ```
pub fn validate_phone_number(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();

    if phone.is_empty() {
        return Err(ValidationError::Required {
            field: "phone_number".to_string(),
        });
    }

    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if !(8..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "phone_number".to_string(),
            reason: "expected 8-15 digits with an optional leading '+'".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Payment
// =============================================================================

/// Parses the payment method field.
///
/// An absent field defaults to COD. A present but unknown value is an
/// error, never silently COD.
pub fn parse_payment_method(raw: Option<&str>) -> CoreResult<PaymentMethod> {
    match raw {
        None => Ok(PaymentMethod::default()),
        Some(value) => value.parse(),
    }
}

/// Gateway amounts must be strictly positive.
pub fn validate_payment_amount(amount: Money) -> CoreResult<()> {
    if !amount.is_positive() {
        return Err(CoreError::InvalidAmount { amount });
    }
    Ok(())
}

// =============================================================================
// Discounts
// =============================================================================

/// Trims a discount code; blank codes count as absent.
pub fn normalize_discount_code(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
}

/// Validates a discount percentage (0-100).
pub fn validate_discount_percentage(pct: u32) -> ValidationResult<()> {
    if pct > 100 {
        return Err(ValidationError::OutOfRange {
            field: "discount_percentage".to_string(),
            min: 0,
            max: 100,
        });
    }
    Ok(())
}

// =============================================================================
// Ledger
// =============================================================================

/// Validates an adjustment reason and the acting id.
pub fn validate_adjustment_context(reason: &str, actor_id: &str) -> ValidationResult<()> {
    require_text("reason", reason, MAX_REASON_LEN)?;
    if actor_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "actor_id".to_string(),
        });
    }
    Ok(())
}

fn require_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
