//! `/api/users` handlers. All routes require authentication.

use std::sync::Arc;

use axum::extract::State;
use mall_core::User;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::response::ApiResponse;
use crate::services::user_service::{ChangePasswordRequest, UpdateProfileRequest};
use crate::state::AppState;

pub async fn profile(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<ApiResponse<User>> {
    Ok(ApiResponse::success(state.users.profile(user.user_id).await?))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<ApiResponse<User>> {
    Ok(ApiResponse::success(
        state.users.update_profile(user.user_id, req).await?,
    ))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<ApiResponse<()>> {
    state.users.change_password(user.user_id, req).await?;
    Ok(ApiResponse::message("password updated"))
}
