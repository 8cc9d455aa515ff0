//! Service implementations.
//!
//! Each service holds the shared [`AppState`](crate::AppState) and takes the
//! calling [`Actor`](storefront_core::Actor) explicitly.

pub mod discount_service;
pub mod inventory_service;
pub mod lifecycle_service;
pub mod order_service;
pub mod payment_service;

pub use discount_service::{DiscountService, NewDiscountCode};
pub use inventory_service::InventoryService;
pub use lifecycle_service::LifecycleService;
pub use order_service::{CheckoutRequest, OrderService};
pub use payment_service::PaymentService;
