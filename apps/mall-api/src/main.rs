//! # Mall API Server
//!
//! HTTP JSON server for the online mall.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mall API Server                                  │
//! │                                                                         │
//! │  Storefront / Admin ───► HTTP (8080) ───► Services ───► SQLite         │
//! │                                               │                         │
//! │                                               ▼                         │
//! │                                             Redis                       │
//! │                                       (category tree)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mall_api::cache::CategoryCache;
use mall_api::rate_limit::STALE_AFTER;
use mall_api::{build_router, AppState, MallConfig};
use mall_db::{Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,mall_api=debug,mall_db=debug,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting Mall API server...");

    // Load configuration
    let config = MallConfig::load().context("loading configuration")?;
    info!(
        listen_addr = %config.listen_addr,
        database_url = %config.database_url,
        redis = config.redis_url.is_some(),
        "Configuration loaded"
    );
    if config.uses_dev_secret() {
        warn!("JWT_SECRET not set, using the development secret");
    }

    // Connect to database (migrations run on connect)
    let db = Database::new(
        DbConfig::new(config.database_url.clone()).max_connections(config.database_max_connections),
    )
    .await
    .context("connecting to database")?;
    info!("Database ready");

    // Connect to Redis (optional)
    let cache = CategoryCache::connect(&config).await;

    let listen_addr = config.listen_addr.clone();
    let state = Arc::new(AppState::new(config, db.clone(), cache));

    // Periodic rate limiter cleanup
    if state.rate_limiter.is_enabled() {
        let rate_limiter = state.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(STALE_AFTER);
            loop {
                interval.tick().await;
                rate_limiter.cleanup().await;
            }
        });
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("binding {listen_addr}"))?;
    info!(addr = %listen_addr, "HTTP server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    tokio::time::timeout(Duration::from_secs(5), db.close())
        .await
        .ok();

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
