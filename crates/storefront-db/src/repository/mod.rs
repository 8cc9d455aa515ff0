//! # Repository Module
//!
//! Database repository implementations for the checkout engine.
//!
//! ## Two Kinds of Methods
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Pool methods (&self, ...)                                              │
//! │  ├── reads: get, list, history, find_by_code                           │
//! │  └── self-contained writes: create_record, restock, delete             │
//! │                                                                         │
//! │  Unit-of-work methods (&self, &mut UnitOfWork, ...)                     │
//! │  ├── inventory.reserve / release                                        │
//! │  ├── discounts.claim                                                    │
//! │  ├── orders.insert / transition                                         │
//! │  └── payments.insert / settle                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  staged in the caller's transaction, committed or rolled back together  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`InventoryRepository`](inventory::InventoryRepository) - Stock ledger and adjustment log
//! - [`DiscountRepository`](discount::DiscountRepository) - One-shot discount codes
//! - [`OrderRepository`](order::OrderRepository) - Orders, lines and shipping info
//! - [`PaymentRepository`](payment::PaymentRepository) - Payment intents and settlement

pub mod discount;
pub mod inventory;
pub mod order;
pub mod payment;
