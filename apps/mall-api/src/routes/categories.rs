//! `/api/categories` handlers (optional auth).
//!
//! Administrators also see hidden categories in the flat list and by id;
//! the tree is always the storefront tree.

use std::sync::Arc;

use axum::extract::State;
use mall_core::{Category, CategoryNode};

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::extract::ApiPath;
use crate::response::ApiResponse;
use crate::state::AppState;

fn sees_hidden(user: &Option<CurrentUser>) -> bool {
    user.as_ref().is_some_and(CurrentUser::is_admin)
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    user: Option<CurrentUser>,
) -> ApiResult<ApiResponse<Vec<Category>>> {
    Ok(ApiResponse::success(
        state.categories.list(sees_hidden(&user)).await?,
    ))
}

pub async fn tree(State(state): State<Arc<AppState>>) -> ApiResult<ApiResponse<Vec<CategoryNode>>> {
    Ok(ApiResponse::success(state.categories.tree().await?))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    user: Option<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ApiResponse<Category>> {
    Ok(ApiResponse::success(
        state.categories.get(id, sees_hidden(&user)).await?,
    ))
}

pub async fn children(
    State(state): State<Arc<AppState>>,
    user: Option<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ApiResponse<Vec<Category>>> {
    Ok(ApiResponse::success(
        state.categories.children(id, sees_hidden(&user)).await?,
    ))
}
