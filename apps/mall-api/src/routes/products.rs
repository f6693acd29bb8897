//! `/api/products` handlers (optional auth).

use std::sync::Arc;

use axum::extract::State;
use mall_core::{Page, Product, ProductSku};

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::extract::{ApiPath, ApiQuery};
use crate::response::ApiResponse;
use crate::services::product_service::{LimitQuery, ProductDetail, ProductQuery};
use crate::state::AppState;

fn is_admin(user: &Option<CurrentUser>) -> bool {
    user.as_ref().is_some_and(CurrentUser::is_admin)
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    user: Option<CurrentUser>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> ApiResult<ApiResponse<Page<Product>>> {
    Ok(ApiResponse::success(
        state.products.list(query, is_admin(&user)).await?,
    ))
}

pub async fn hot(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> ApiResult<ApiResponse<Vec<Product>>> {
    Ok(ApiResponse::success(state.products.hot(query.limit).await?))
}

pub async fn newest(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> ApiResult<ApiResponse<Vec<Product>>> {
    Ok(ApiResponse::success(state.products.newest(query.limit).await?))
}

pub async fn detail(
    State(state): State<Arc<AppState>>,
    user: Option<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ApiResponse<ProductDetail>> {
    Ok(ApiResponse::success(
        state.products.detail(id, is_admin(&user)).await?,
    ))
}

pub async fn skus(
    State(state): State<Arc<AppState>>,
    user: Option<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ApiResponse<Vec<ProductSku>>> {
    Ok(ApiResponse::success(
        state.products.skus(id, is_admin(&user)).await?,
    ))
}
