//! API routes for the mall.
//!
//! ```text
//! /health                          public, no envelope, no rate limit
//! /api/auth/{login,register,refresh-token}   public
//! /api/auth/logout, /api/users/*, /api/addresses/*   require_auth
//! /api/categories/*, /api/products/*          optional_auth
//! /api/admin/*                                require_auth + require_admin
//! ```
//! Every `/api` route passes the per-IP rate limiter first.

pub mod addresses;
pub mod admin;
pub mod auth;
pub mod categories;
pub mod health;
pub mod products;
pub mod users;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::{middleware, Router};

use crate::auth::{optional_auth, require_admin, require_auth};
use crate::error::ApiError;
use crate::rate_limit::rate_limit;
use crate::state::AppState;

/// Create the combined router
pub fn create_router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/refresh-token", post(auth::refresh_token));

    let catalog = Router::new()
        .route("/api/categories", get(categories::list))
        .route("/api/categories/tree", get(categories::tree))
        .route("/api/categories/{id}", get(categories::get))
        .route("/api/categories/{id}/children", get(categories::children))
        .route("/api/products", get(products::list))
        .route("/api/products/hot", get(products::hot))
        .route("/api/products/new", get(products::newest))
        .route("/api/products/{id}", get(products::detail))
        .route("/api/products/{id}/skus", get(products::skus))
        .layer(middleware::from_fn_with_state(state.clone(), optional_auth));

    let account = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route(
            "/api/users/profile",
            get(users::profile).put(users::update_profile),
        )
        .route("/api/users/password", put(users::change_password))
        .route(
            "/api/addresses",
            get(addresses::list).post(addresses::create),
        )
        .route(
            "/api/addresses/{id}",
            get(addresses::get)
                .put(addresses::update)
                .delete(addresses::delete),
        )
        .route("/api/addresses/{id}/default", put(addresses::set_default))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Layers run bottom-up: require_auth, then require_admin.
    let admin = Router::new()
        .route("/api/admin/categories", post(admin::create_category))
        .route("/api/admin/categories/tree", get(admin::category_tree))
        .route(
            "/api/admin/categories/{id}",
            put(admin::update_category).delete(admin::delete_category),
        )
        .route(
            "/api/admin/categories/{id}/status",
            put(admin::set_category_status),
        )
        .route("/api/admin/products", post(admin::create_product))
        .route(
            "/api/admin/products/{id}",
            put(admin::update_product).delete(admin::delete_product),
        )
        .route(
            "/api/admin/products/{id}/status",
            put(admin::set_product_status),
        )
        .route("/api/admin/products/{id}/skus", post(admin::add_sku))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .merge(public)
        .merge(catalog)
        .merge(account)
        .merge(admin)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(api)
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("route not found".to_string())
}
