//! # mall-db: Database Layer for the Online Mall
//!
//! This crate provides database access for the mall backend.
//! It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mall Data Flow                                   │
//! │                                                                         │
//! │  HTTP handler (mall-api) → service                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     mall-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ UserRepo      │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ CategoryRepo  │    │ 001_init.sql │  │   │
//! │  │   │ Connection    │    │ ProductRepo   │    │              │  │   │
//! │  │   │ Management    │    │ AddressRepo…  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (file in WAL mode, or sqlite::memory: in tests)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per aggregate
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mall_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("sqlite://mall.db")).await?;
//!
//! let categories = db.categories().list_all(false).await?;
//! let user = db.users().find_by_login("alice").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::address::{AddressInput, AddressRepository};
pub use repository::cart::CartRepository;
pub use repository::category::{CategoryInput, CategoryRepository};
pub use repository::coupon::{CouponInput, CouponRepository};
pub use repository::order::{NewOrder, OrderRepository};
pub use repository::product::{
    ProductFilter, ProductInput, ProductRepository, ProductSort, SkuInput,
};
pub use repository::user::{NewUser, ProfileUpdate, UniqueUserField, UserRepository};
