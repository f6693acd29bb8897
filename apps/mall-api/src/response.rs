//! # Response Envelope
//!
//! Every API response body has the same shape:
//!
//! ```json
//! { "code": 200, "message": "success", "data": { ... } }
//! ```
//!
//! The HTTP status mirrors `code`; clients should treat `code` as the
//! authoritative business status. `data` is `null` on errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

pub const SUCCESS_MESSAGE: &str = "success";

/// The `{code, message, data}` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// 200 with data.
    pub fn success(data: T) -> Self {
        ApiResponse {
            code: StatusCode::OK.as_u16(),
            message: SUCCESS_MESSAGE.to_string(),
            data: Some(data),
        }
    }

    /// 201 with data.
    pub fn created(data: T) -> Self {
        ApiResponse {
            code: StatusCode::CREATED.as_u16(),
            message: SUCCESS_MESSAGE.to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// 200 with a message and no data.
    pub fn message(message: impl Into<String>) -> Self {
        ApiResponse {
            code: StatusCode::OK.as_u16(),
            message: message.into(),
            data: None,
        }
    }

    /// Error envelope for `status`.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        ApiResponse {
            code: status.as_u16(),
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
