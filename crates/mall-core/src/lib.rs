//! # mall-core: Pure Business Logic for the Online Mall
//!
//! This crate contains the domain model and every rule that can be
//! expressed without I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Online Mall Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 mall-api (axum HTTP JSON API)                   │   │
//! │  │   auth gate ──► controllers ──► services                        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ mall-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────┐ ┌──────────┐ ┌─────────────┐ ┌────────────────┐  │   │
//! │  │  │  types   │ │  money   │ │   coupon    │ │ category_tree  │  │   │
//! │  │  │  order   │ │pagination│ │  evaluator  │ │    builder     │  │   │
//! │  │  │  cart    │ │validation│ │             │ │                │  │   │
//! │  │  └──────────┘ └──────────┘ └─────────────┘ └────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    mall-db (Database Layer)                     │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Users, categories, products, SKUs, addresses, soft delete
//! - [`money`] - Money type with integer arithmetic
//! - [`coupon`] - Coupon validity and discount rules
//! - [`category_tree`] - Flat list → nested tree
//! - [`pagination`] - Page normalization and page results
//! - [`order`] - Order numbers, item snapshots, totals
//! - [`cart`] - Cart lines
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use mall_core::money::Money;
//! use mall_core::pagination::normalize;
//!
//! assert_eq!(normalize(0, 1000), (1, 10));
//! assert_eq!(Money::from_cents(10000).percent_of(2000).cents(), 2000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod category_tree;
pub mod coupon;
pub mod error;
pub mod money;
pub mod order;
pub mod pagination;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::CartItem;
pub use category_tree::{build_tree, CategoryNode, CategoryTree, OrphanPolicy};
pub use coupon::{Coupon, CouponKind, CouponStatus, UserCoupon, UserCouponStatus};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use order::{NewOrderItem, Order, OrderItem, OrderStatus, OrderTotals, PayStatus};
pub use pagination::{Page, PageRequest};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single cart line or order line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;
