//! `/api/auth` handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;

use crate::auth::middleware::bearer_token;
use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::response::ApiResponse;
use crate::services::auth_service::{AuthPayload, LoginRequest, RegisterRequest, TokenPayload};
use crate::state::AppState;

pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<ApiResponse<AuthPayload>> {
    Ok(ApiResponse::success(state.auth.login(req).await?))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<ApiResponse<AuthPayload>> {
    Ok(ApiResponse::created(state.auth.register(req).await?))
}

/// Needs a still-valid bearer token; the old token is not revoked.
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<ApiResponse<TokenPayload>> {
    let token = bearer_token(&headers)?;
    Ok(ApiResponse::success(state.auth.refresh(token)?))
}

/// Tokens are stateless; the client discards its copy.
pub async fn logout(user: CurrentUser) -> ApiResponse<()> {
    tracing::info!(user_id = user.user_id, "User logged out");
    ApiResponse::message("logged out")
}
