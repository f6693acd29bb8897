//! `/api/addresses` handlers. All routes require authentication and only
//! ever touch the caller's own addresses.

use std::sync::Arc;

use axum::extract::State;
use mall_core::Address;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath};
use crate::response::ApiResponse;
use crate::services::address_service::AddressRequest;
use crate::state::AppState;

pub async fn list(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<ApiResponse<Vec<Address>>> {
    Ok(ApiResponse::success(state.addresses.list(user.user_id).await?))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ApiResponse<Address>> {
    Ok(ApiResponse::success(
        state.addresses.get(user.user_id, id).await?,
    ))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(req): ApiJson<AddressRequest>,
) -> ApiResult<ApiResponse<Address>> {
    Ok(ApiResponse::created(
        state.addresses.create(user.user_id, req).await?,
    ))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<AddressRequest>,
) -> ApiResult<ApiResponse<Address>> {
    Ok(ApiResponse::success(
        state.addresses.update(user.user_id, id, req).await?,
    ))
}

pub async fn set_default(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ApiResponse<Address>> {
    Ok(ApiResponse::success(
        state.addresses.set_default(user.user_id, id).await?,
    ))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ApiResponse<()>> {
    state.addresses.delete(user.user_id, id).await?;
    Ok(ApiResponse::message("address deleted"))
}
