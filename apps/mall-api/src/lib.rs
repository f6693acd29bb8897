//! # Mall API
//!
//! JSON HTTP server for the online mall.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Mall API Layers                                 │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  Middleware    │  │  Routes        │  │  Services                  ││
//! │  │                │  │                │  │                            ││
//! │  │ • TraceLayer   │  │ • /api/auth    │  │ • AuthService              ││
//! │  │ • CORS         │─►│ • /api/users   │─►│ • UserService              ││
//! │  │ • rate_limit   │  │ • /api/...     │  │ • Category/ProductService  ││
//! │  │ • auth gate    │  │ • /api/admin   │  │ • AddressService           ││
//! │  └────────────────┘  └────────────────┘  └─────────────┬──────────────┘│
//! │                                                        │               │
//! │  ┌─────────────────────────────────────────────────────▼────────────┐  │
//! │  │                      Infrastructure                               │  │
//! │  │                                                                   │  │
//! │  │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐│  │
//! │  │  │  SQLite      │  │    Redis     │  │    JWT / Argon2          ││  │
//! │  │  │  (mall-db)   │  │  (optional)  │  │                          ││  │
//! │  │  │ Primary data │  │ category tree│  │ Tokens, password hashes  ││  │
//! │  │  └──────────────┘  └──────────────┘  └──────────────────────────┘│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables (see [`config::MallConfig::load`]):
//! - `MALL_LISTEN_ADDR` - bind address (default: 0.0.0.0:8080)
//! - `DATABASE_URL` - SQLite connection string
//! - `REDIS_URL` - Redis connection string (optional)
//! - `JWT_SECRET` - Secret for JWT signing
//! - `JWT_EXPIRE_HOURS` - Token lifetime (default: 24)
//! - `RATE_LIMIT_PER_MINUTE` - Requests per IP per minute (default: 100)

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod rate_limit;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// Re-exports
pub use config::MallConfig;
pub use error::{ApiError, ApiResult};
pub use response::ApiResponse;
pub use state::AppState;

/// Assembles the full application: routes, rate limiting, auth gates,
/// request tracing and CORS.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = if state.config.cors_allow_any {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    routes::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
