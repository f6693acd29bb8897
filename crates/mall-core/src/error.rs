//! # Error Types
//!
//! Domain-specific error types for mall-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  mall-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  mall-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  mall-api errors (in app)                                              │
//! │  └── ApiError         - HTTP status + response envelope                │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations. The HTTP layer maps
/// every variant except `NotFound` to a 400.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity cannot be found (or is soft-deleted).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Insufficient stock to complete an order or stock decrement.
    ///
    /// ## User Workflow
    /// ```text
    /// Place order (qty: 5)
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { product_id: 7, available: 3, requested: 5 }
    /// ```
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: i64,
        available: i64,
        requested: i64,
    },

    /// Coupon validity bounds could not be parsed or are inverted.
    #[error("Invalid coupon window: {reason}")]
    InvalidCouponWindow { reason: String },

    /// Coupon has no stock left to claim.
    #[error("Coupon {coupon_id} is out of stock")]
    CouponExhausted { coupon_id: i64 },

    /// Coupon is disabled or outside its validity window.
    #[error("Coupon {coupon_id} is not available")]
    CouponUnavailable { coupon_id: i64 },

    /// Order is not in a state that allows the requested operation.
    #[error("Order {order_no} is {current_status}, cannot {operation}")]
    InvalidOrderStatus {
        order_no: String,
        current_status: String,
        operation: &'static str,
    },

    /// Category operation would break the tree.
    #[error("Invalid category hierarchy: {reason}")]
    InvalidHierarchy { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., bad email, unparsable date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
