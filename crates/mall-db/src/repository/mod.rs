//! # Repository Module
//!
//! Database repository implementations for the mall.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  HTTP handler / service                                                │
//! │       │                                                                 │
//! │       │  state.db.products().list(&filter, page)                       │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── list(&self, filter, page)                                         │
//! │  ├── get(&self, id)                                                    │
//! │  ├── create(&self, product)                                            │
//! │  └── decrement_stock(&self, id, qty)                                   │
//! │       │                                                                 │
//! │       │  SQL (runtime-checked, bound parameters only)                  │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Default reads skip soft-deleted rows (deleted_at IS NOT NULL).        │
//! │  Multi-row invariants run inside one transaction.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`user::UserRepository`] - Accounts, login lookup
//! - [`address::AddressRepository`] - Shipping addresses, default flag
//! - [`category::CategoryRepository`] - Category hierarchy
//! - [`product::ProductRepository`] - Products, SKUs, stock
//! - [`cart::CartRepository`] - Cart lines
//! - [`coupon::CouponRepository`] - Coupon templates and claims
//! - [`order::OrderRepository`] - Orders with item snapshots

pub mod address;
pub mod cart;
pub mod category;
pub mod coupon;
pub mod order;
pub mod product;
pub mod user;

/// Fresh migrated in-memory database for repository tests.
#[cfg(test)]
pub(crate) async fn test_db() -> crate::Database {
    crate::Database::new(crate::DbConfig::in_memory())
        .await
        .expect("in-memory database")
}
