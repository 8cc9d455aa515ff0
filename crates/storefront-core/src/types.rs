//! # Domain Types
//!
//! Core domain types shared by the database layer and the checkout service.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Order       │   │    Payment      │       │
//! │  │  (catalog, RO)  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  selling_price  │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  promotion?     │   │  status         │   │  order_id (1:1) │       │
//! │  └─────────────────┘   │  lines[]        │   │  method, status │       │
//! │                        │  shipping       │   │  transaction_id │       │
//! │  ┌─────────────────┐   │  total_price    │   └─────────────────┘       │
//! │  │ InventoryRecord │   └─────────────────┘                              │
//! │  │ + Adjustment log│   ┌─────────────────┐   ┌─────────────────┐       │
//! │  └─────────────────┘   │  DiscountCode   │   │     Actor       │       │
//! │                        │  one-shot       │   │  id + roles     │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## References By Id
//! Entities never embed each other. An order line holds a `product_id`, a
//! payment holds an `order_id`; resolution goes through the catalog or a
//! repository.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::CoreError;
use crate::money::Money;

/// Catalog product identifier.
pub type ProductId = i64;

/// Generates a new entity id (UUID v4).
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Identity
// =============================================================================

/// Roles supplied by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Admin,
    Staff,
}

/// An authenticated caller. The core never re-derives identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub id: String,
    pub roles: Vec<Role>,
}

impl Actor {
    pub fn new(id: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Actor {
            id: id.into(),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn customer(id: impl Into<String>) -> Self {
        Actor::new(id, [Role::Customer])
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// ADMIN or STAFF.
    pub fn is_elevated(&self) -> bool {
        self.has_role(Role::Admin) || self.has_role(Role::Staff)
    }

    /// Owners and elevated actors may view or cancel an order.
    pub fn can_manage_order_of(&self, owner_id: &str) -> bool {
        self.id == owner_id || self.is_elevated()
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A per-product time-boxed price override.
///
/// Active on the half-open window `[starts_at, ends_at)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Promotion {
    pub price: Money,
    #[ts(as = "String")]
    pub starts_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub ends_at: DateTime<Utc>,
}

impl Promotion {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && now < self.ends_at
    }
}

/// Read-only catalog view of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub selling_price: Money,
    pub promotion: Option<Promotion>,
}

impl Product {
    /// Whether the product's own promotion is running at `now`.
    pub fn promotion_active(&self, now: DateTime<Utc>) -> bool {
        self.promotion.as_ref().is_some_and(|p| p.is_active(now))
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// Current stock counter for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryRecord {
    pub product_id: ProductId,
    pub quantity: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Append-only audit entry for every ledger call.
///
/// `applied = false` entries record rejected reservations; they never touch
/// the counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryAdjustment {
    pub id: String,
    pub product_id: ProductId,
    pub delta: i64,
    pub reason: String,
    pub actor_id: String,
    pub applied: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Discount Code
// =============================================================================

/// A storewide one-shot percentage code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountCode {
    pub id: String,
    pub code: String,
    /// 0-100.
    pub discount_percentage: u32,
    pub min_order_value: Money,
    /// Inclusive.
    #[ts(as = "String")]
    pub valid_from: DateTime<Utc>,
    /// Inclusive.
    #[ts(as = "String")]
    pub valid_to: DateTime<Utc>,
    pub used: bool,
}

// =============================================================================
// Order Status
// =============================================================================

/// The status of an order.
///
/// ```text
///   PENDING ──► SHIPPED ──► COMPLETED
///      │                       ▲
///      ├───────────────────────┘
///      └──► CANCELLED (releases stock)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive, surrounding whitespace ignored.
impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            _ => Err(CoreError::InvalidOrderStatus(s.to_string())),
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the customer settles the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash on delivery.
    Cod,
    /// Online payment through the VNPay gateway redirect.
    Vnpay,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "COD",
            PaymentMethod::Vnpay => "VNPAY",
        }
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cod
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COD" => Ok(PaymentMethod::Cod),
            "VNPAY" => Ok(PaymentMethod::Vnpay),
            _ => Err(CoreError::InvalidPaymentMethod(s.to_string())),
        }
    }
}

// =============================================================================
// Payment Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Waiting for the gateway or for delivery.
    Pending,
    Paid,
    Failed,
    /// Cash-on-delivery order handed to the carrier.
    AwaitingDelivery,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::AwaitingDelivery => "AWAITING_DELIVERY",
        }
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "FAILED" => Ok(PaymentStatus::Failed),
            "AWAITING_DELIVERY" => Ok(PaymentStatus::AwaitingDelivery),
            _ => Err(CoreError::InvalidPaymentStatus(s.to_string())),
        }
    }
}

// =============================================================================
// Cart & Order
// =============================================================================

/// One validated (product, quantity) pair from the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// A priced order line. The unit price is frozen at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

impl OrderLine {
    /// `unit_price × quantity`, `None` on overflow.
    #[inline]
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul_quantity(self.quantity)
    }
}

/// Delivery details owned by exactly one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShippingInfo {
    pub address: String,
    pub phone_number: String,
    pub carrier: String,
    pub fee: Money,
    #[ts(as = "Option<String>")]
    pub estimated_delivery: Option<NaiveDate>,
}

/// A customer order.
///
/// `total_price = subtotal - discount_amount + shipping_fee`, fixed at
/// creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub status: OrderStatus,
    /// Cart order preserved.
    pub lines: Vec<OrderLine>,
    pub shipping: ShippingInfo,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub shipping_fee: Money,
    pub total_price: Money,
    pub applied_discount_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Recomputes the total from the stored parts.
    pub fn reconciles(&self) -> bool {
        let lines = self
            .lines
            .iter()
            .try_fold(Money::zero(), |acc, line| acc.checked_add(line.line_total()?));
        let total = self
            .subtotal
            .checked_sub(self.discount_amount)
            .and_then(|t| t.checked_add(self.shipping_fee));

        lines == Some(self.subtotal) && total == Some(self.total_price)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// Payment intent, created with its order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Order total at creation; compared against the gateway-reported amount.
    pub amount: Money,
    /// Gateway-assigned, set on callback.
    pub transaction_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn test_promotion_window_is_half_open() {
        let promo = Promotion {
            price: Money::from_major(400_000),
            starts_at: at(8),
            ends_at: at(12),
        };
        assert!(!promo.is_active(at(8) - Duration::seconds(1)));
        assert!(promo.is_active(at(8)));
        assert!(promo.is_active(at(11)));
        assert!(!promo.is_active(at(12)));
    }

    #[test]
    fn test_promotion_active_follows_its_window() {
        let product = Product {
            id: 7,
            name: "Phone".to_string(),
            selling_price: Money::from_major(500_000),
            promotion: Some(Promotion {
                price: Money::from_major(450_000),
                starts_at: at(8),
                ends_at: at(12),
            }),
        };
        assert!(product.promotion_active(at(9)));
        assert!(!product.promotion_active(at(13)));
    }

    #[test]
    fn test_elevated_roles() {
        assert!(!Actor::customer("u1").is_elevated());
        assert!(Actor::new("s1", [Role::Staff]).is_elevated());
        assert!(Actor::new("a1", [Role::Customer, Role::Admin]).is_elevated());
    }

    #[test]
    fn test_can_manage_order() {
        let owner = Actor::customer("u1");
        let stranger = Actor::customer("u2");
        let staff = Actor::new("s1", [Role::Staff]);

        assert!(owner.can_manage_order_of("u1"));
        assert!(!stranger.can_manage_order_of("u1"));
        assert!(staff.can_manage_order_of("u1"));
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("cod".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cod);
        assert_eq!(" VnPay ".parse::<PaymentMethod>().unwrap(), PaymentMethod::Vnpay);
        assert!(matches!(
            "paypal".parse::<PaymentMethod>(),
            Err(CoreError::InvalidPaymentMethod(s)) if s == "paypal"
        ));
    }

    #[test]
    fn test_order_status_parsing() {
        assert_eq!("completed".parse::<OrderStatus>().unwrap(), OrderStatus::Completed);
        assert!("DELIVERING".parse::<OrderStatus>().is_err());
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_payment_status_parsing() {
        assert_eq!(
            "awaiting_delivery".parse::<PaymentStatus>().unwrap(),
            PaymentStatus::AwaitingDelivery
        );
        assert!("REFUNDED".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_upper_case() {
        let json = serde_json::to_string(&OrderStatus::Cancelled).unwrap();
        assert_eq!(json, "\"CANCELLED\"");
        let json = serde_json::to_string(&PaymentStatus::AwaitingDelivery).unwrap();
        assert_eq!(json, "\"AWAITING_DELIVERY\"");
    }

    #[test]
    fn test_order_reconciles() {
        let now = at(10);
        let order = Order {
            id: new_id(),
            customer_id: "u1".to_string(),
            status: OrderStatus::Pending,
            lines: vec![
                OrderLine { product_id: 7, quantity: 2, unit_price: Money::from_major(500_000) },
                OrderLine { product_id: 9, quantity: 1, unit_price: Money::from_major(1_200_000) },
            ],
            shipping: ShippingInfo {
                address: "1 Le Loi".to_string(),
                phone_number: "0900000000".to_string(),
                carrier: "GHN".to_string(),
                fee: Money::from_major(30_000),
                estimated_delivery: None,
            },
            subtotal: Money::from_major(2_200_000),
            discount_amount: Money::zero(),
            shipping_fee: Money::from_major(30_000),
            total_price: Money::from_major(2_230_000),
            applied_discount_id: None,
            created_at: now,
            updated_at: now,
        };
        assert!(order.reconciles());

        let mut tampered = order.clone();
        tampered.total_price = Money::from_major(2_200_000);
        assert!(!tampered.reconciles());
    }
}
