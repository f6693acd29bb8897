//! Shared application state.
//!
//! Built once at startup and handed to the router as `Arc<AppState>`.
//! Nothing in the crate reaches for a global database or cache handle.

use std::sync::Arc;

use mall_db::Database;

use crate::auth::TokenService;
use crate::cache::CategoryCache;
use crate::config::MallConfig;
use crate::rate_limit::RateLimiter;
use crate::services::{
    AddressService, AuthService, CategoryService, ProductService, UserService,
};

pub struct AppState {
    pub config: MallConfig,
    pub db: Database,
    pub tokens: Arc<TokenService>,
    pub rate_limiter: RateLimiter,
    pub auth: AuthService,
    pub users: UserService,
    pub categories: CategoryService,
    pub products: ProductService,
    pub addresses: AddressService,
}

impl AppState {
    pub fn new(config: MallConfig, db: Database, cache: CategoryCache) -> Self {
        let tokens = Arc::new(TokenService::from_config(&config));
        let rate_limiter = RateLimiter::new(config.rate_limit_per_minute);

        AppState {
            auth: AuthService::new(db.users(), tokens.clone()),
            users: UserService::new(db.users()),
            categories: CategoryService::new(db.categories(), cache),
            products: ProductService::new(db.products(), db.categories()),
            addresses: AddressService::new(db.addresses()),
            tokens,
            rate_limiter,
            config,
            db,
        }
    }
}
