//! # API Error Type
//!
//! Unified error type for HTTP handlers and services.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Mall API                           │
//! │                                                                         │
//! │  Handler → Service → Repository                                         │
//! │                          │                                              │
//! │     ValidationError ─────┤                                              │
//! │     CoreError ───────────┤                                              │
//! │     DbError ─────────────┼──► ApiError ──► status + envelope            │
//! │     AuthError ───────────┤                                              │
//! │     PasswordError ───────┘                                              │
//! │                                                                         │
//! │  Validation / Conflict   400                                            │
//! │  Unauthorized            401                                            │
//! │  Forbidden               403                                            │
//! │  NotFound                404                                            │
//! │  RateLimited             429                                            │
//! │  Internal                500  (detail logged, never sent)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mall_core::{CoreError, ValidationError};
use mall_db::DbError;

use crate::auth::{AuthError, PasswordError};
use crate::response::ApiResponse;

/// Message sent for every 500.
pub const INTERNAL_MESSAGE: &str = "internal server error";

/// API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    /// Missing, malformed, invalid or expired credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Duplicate unique value or dependent rows. Reported as 400.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    RateLimited(String),

    /// Unexpected failure; the detail stays in the logs.
    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal server error");
                INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        };

        ApiResponse::error(status, message).into_response()
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            CoreError::Validation(inner) => inner.into(),
            CoreError::InsufficientStock { .. }
            | CoreError::InvalidCouponWindow { .. }
            | CoreError::CouponExhausted { .. }
            | CoreError::CouponUnavailable { .. }
            | CoreError::InvalidOrderStatus { .. }
            | CoreError::InvalidHierarchy { .. } => ApiError::Validation(err.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            DbError::UniqueViolation { field, .. } => {
                ApiError::Conflict(format!("{field} already exists"))
            }
            DbError::ForeignKeyViolation { .. } => {
                ApiError::Validation("referenced record does not exist".to_string())
            }
            DbError::Conflict(message) => ApiError::Conflict(message),
            DbError::Domain(core) => core.into(),
            DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::PoolExhausted
            | DbError::Internal(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Signing(_) => ApiError::Internal(err.to_string()),
            AuthError::MissingHeader
            | AuthError::MalformedHeader
            | AuthError::InvalidToken
            | AuthError::ExpiredToken => ApiError::Unauthorized(err.to_string()),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(DbError::duplicate("username", "bob")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(DbError::not_found("Product", 9)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(DbError::Conflict("category has children".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuthError::ExpiredToken).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(DbError::PoolExhausted).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_errors_unwrap_through_db() {
        let err = DbError::Domain(CoreError::InsufficientStock {
            product_id: 1,
            available: 0,
            requested: 2,
        });
        assert!(matches!(ApiError::from(err), ApiError::Validation(_)));
    }

    #[test]
    fn test_duplicate_names_field() {
        let err = ApiError::from(DbError::duplicate("email", "a@b.c"));
        assert_eq!(err.to_string(), "email already exists");
    }
}
