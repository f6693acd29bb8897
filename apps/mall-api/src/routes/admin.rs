//! `/api/admin` handlers. Every route sits behind `require_auth` and
//! `require_admin`.

use std::sync::Arc;

use axum::extract::State;
use mall_core::{Category, CategoryStatus, CategoryTree, OrphanPolicy, Product, ProductSku, ProductStatus};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::response::ApiResponse;
use crate::services::category_service::CategoryRequest;
use crate::services::product_service::{ProductRequest, SkuRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusRequest<T> {
    pub status: T,
}

#[derive(Debug, Default, Deserialize)]
pub struct TreeQuery {
    #[serde(default)]
    pub orphans: OrphanPolicy,
}

// =============================================================================
// Categories
// =============================================================================

/// `?orphans=drop|promote_to_root`; the response lists orphaned ids.
pub async fn category_tree(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<TreeQuery>,
) -> ApiResult<ApiResponse<CategoryTree>> {
    Ok(ApiResponse::success(
        state.categories.admin_tree(query.orphans).await?,
    ))
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CategoryRequest>,
) -> ApiResult<ApiResponse<Category>> {
    Ok(ApiResponse::created(state.categories.create(req).await?))
}

pub async fn update_category(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<CategoryRequest>,
) -> ApiResult<ApiResponse<Category>> {
    Ok(ApiResponse::success(state.categories.update(id, req).await?))
}

pub async fn set_category_status(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<StatusRequest<CategoryStatus>>,
) -> ApiResult<ApiResponse<()>> {
    state.categories.set_status(id, req.status).await?;
    Ok(ApiResponse::message("category status updated"))
}

pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ApiResponse<()>> {
    state.categories.delete(id).await?;
    Ok(ApiResponse::message("category deleted"))
}

// =============================================================================
// Products
// =============================================================================

pub async fn create_product(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ProductRequest>,
) -> ApiResult<ApiResponse<Product>> {
    Ok(ApiResponse::created(state.products.create(req).await?))
}

pub async fn update_product(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ProductRequest>,
) -> ApiResult<ApiResponse<Product>> {
    Ok(ApiResponse::success(state.products.update(id, req).await?))
}

pub async fn set_product_status(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<StatusRequest<ProductStatus>>,
) -> ApiResult<ApiResponse<()>> {
    state.products.set_status(id, req.status).await?;
    Ok(ApiResponse::message("product status updated"))
}

pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ApiResponse<()>> {
    state.products.delete(id).await?;
    Ok(ApiResponse::message("product deleted"))
}

pub async fn add_sku(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<SkuRequest>,
) -> ApiResult<ApiResponse<ProductSku>> {
    Ok(ApiResponse::created(state.products.add_sku(id, req).await?))
}
