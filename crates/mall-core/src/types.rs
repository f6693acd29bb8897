//! # Domain Types
//!
//! Core catalog and account types used throughout the mall.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      User       │   │    Category     │   │    Product      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  username (uq)  │   │  parent_id      │◄──│  category_id    │       │
//! │  │  phone? (uq)    │   │  level          │   │  price (Money)  │       │
//! │  │  email? (uq)    │   │  sort           │   │  stock, sales   │       │
//! │  │  role, status   │   │  status         │   │  images (JSON)  │       │
//! │  └────────┬────────┘   └─────────────────┘   └────────┬────────┘       │
//! │           │ owns                                      │ owns           │
//! │  ┌────────▼────────┐                         ┌────────▼────────┐       │
//! │  │    Address      │                         │   ProductSku    │       │
//! │  │  one default    │                         │  specifications │       │
//! │  │  per user       │                         │  price, stock   │       │
//! │  └─────────────────┘                         └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cart, order and coupon types live in [`crate::cart`], [`crate::order`]
//! and [`crate::coupon`].
//!
//! ## Soft Delete
//! Every persisted entity carries a [`RecordState`] instead of a nullable
//! deletion timestamp. Repositories only ever return `Active` rows from
//! default queries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Record State (soft delete)
// =============================================================================

/// Lifecycle state of a persisted row.
///
/// Stored as a nullable `deleted_at` column; `NULL` is `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecordState {
    #[default]
    Active,
    Deleted { at: DateTime<Utc> },
}

impl RecordState {
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, RecordState::Active)
    }

    /// The column value for this state.
    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            RecordState::Active => None,
            RecordState::Deleted { at } => Some(*at),
        }
    }
}

impl From<Option<DateTime<Utc>>> for RecordState {
    fn from(deleted_at: Option<DateTime<Utc>>) -> Self {
        match deleted_at {
            None => RecordState::Active,
            Some(at) => RecordState::Deleted { at },
        }
    }
}

// =============================================================================
// User
// =============================================================================

/// Authorization role carried in session tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Account status. Disabled accounts cannot log in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Disabled,
}

/// A registered account.
///
/// The password hash is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub nickname: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub avatar: String,
    pub role: Role,
    pub status: UserStatus,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(
        feature = "sqlx",
        sqlx(rename = "deleted_at", try_from = "Option<DateTime<Utc>>")
    )]
    #[serde(skip)]
    pub state: RecordState,
}

impl User {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active && self.state.is_active()
    }
}

// =============================================================================
// Category
// =============================================================================

/// Parent id used by top-level categories.
pub const ROOT_CATEGORY_ID: i64 = 0;

/// Storefront visibility of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum CategoryStatus {
    #[default]
    Visible,
    Hidden,
}

/// A node of the self-referential category tree.
///
/// ## Rules
/// - `parent_id == 0` marks a root
/// - `level == parent.level + 1`, or `1` for roots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub parent_id: i64,
    pub level: i32,
    pub sort: i32,
    pub status: CategoryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(
        feature = "sqlx",
        sqlx(rename = "deleted_at", try_from = "Option<DateTime<Utc>>")
    )]
    #[serde(skip)]
    pub state: RecordState,
}

impl Category {
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent_id == ROOT_CATEGORY_ID
    }
}

/// Computes the level of a category placed under `parent`.
///
/// ## Example
/// ```rust
/// use mall_core::types::child_level;
///
/// assert_eq!(child_level(None), 1);
/// assert_eq!(child_level(Some(2)), 3);
/// ```
#[inline]
pub fn child_level(parent_level: Option<i32>) -> i32 {
    parent_level.map_or(1, |level| level + 1)
}

// =============================================================================
// Product
// =============================================================================

/// Whether a product is on sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    #[default]
    Listed,
    Unlisted,
}

/// A catalog product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub category_id: i64,
    pub description: String,

    /// Selling price, never negative.
    pub price: Money,

    /// Strike-through price shown next to `price`.
    pub original_price: Option<Money>,

    pub stock: i64,
    pub sales: i64,

    /// Image URLs, stored as a JSON array.
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub images: Vec<String>,

    pub video_url: String,
    pub status: ProductStatus,
    pub is_hot: bool,
    pub is_new: bool,
    pub sort: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(
        feature = "sqlx",
        sqlx(rename = "deleted_at", try_from = "Option<DateTime<Utc>>")
    )]
    #[serde(skip)]
    pub state: RecordState,
}

impl Product {
    /// First image, used as the cover in listings and order snapshots.
    pub fn cover_image(&self) -> &str {
        self.images.first().map(String::as_str).unwrap_or_default()
    }

    /// Checks if `quantity` units can be taken from stock.
    #[inline]
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.status == ProductStatus::Listed && self.stock >= quantity
    }
}

/// A purchasable variant of a product (size/color combination).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductSku {
    pub id: i64,
    pub product_id: i64,
    pub name: String,

    /// Specification set, e.g. `{"color": "red", "size": "M"}`.
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub specifications: BTreeMap<String, String>,

    pub price: Money,
    pub stock: i64,
    pub sales: i64,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(
        feature = "sqlx",
        sqlx(rename = "deleted_at", try_from = "Option<DateTime<Utc>>")
    )]
    #[serde(skip)]
    pub state: RecordState,
}

// =============================================================================
// Address
// =============================================================================

/// A user-owned shipping address.
///
/// At most one address per user has `is_default == true`; writes that set
/// the flag clear it on the user's other addresses in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub phone: String,
    pub province: String,
    pub city: String,
    pub district: String,
    pub detail: String,
    pub postcode: String,
    pub tag: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(
        feature = "sqlx",
        sqlx(rename = "deleted_at", try_from = "Option<DateTime<Utc>>")
    )]
    #[serde(skip)]
    pub state: RecordState,
}

impl Address {
    /// Single-line rendering: province, city, district, detail.
    pub fn full_address(&self) -> String {
        format!(
            "{} {} {} {}",
            self.province, self.city, self.district, self.detail
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_state_from_column() {
        assert_eq!(RecordState::from(None), RecordState::Active);

        let at = Utc::now();
        let state = RecordState::from(Some(at));
        assert!(!state.is_active());
        assert_eq!(state.deleted_at(), Some(at));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[test]
    fn test_child_level() {
        assert_eq!(child_level(None), 1);
        assert_eq!(child_level(Some(1)), 2);
    }

    #[test]
    fn test_user_json_hides_password_hash() {
        let now = Utc::now();
        let user = User {
            id: 1,
            username: "alice".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            nickname: String::new(),
            phone: None,
            email: Some("alice@example.com".to_string()),
            avatar: String::new(),
            role: Role::User,
            status: UserStatus::Active,
            last_login_at: None,
            created_at: now,
            updated_at: now,
            state: RecordState::Active,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("state").is_none());
        assert_eq!(json["role"], "user");
        assert!(user.is_active());
    }
}
