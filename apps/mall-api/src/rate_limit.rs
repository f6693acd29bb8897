//! Per-IP rate limiting for the API routes.
//!
//! Fixed one-minute windows per client IP. The counter map lives behind a
//! single async mutex; windows reset lazily on the next request, and
//! [`RateLimiter::cleanup`] drops idle entries so the map does not grow
//! without bound.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Length of one counting window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Entries idle for longer than this are removed by `cleanup`.
pub const STALE_AFTER: Duration = Duration::from_secs(300);

struct IpEntry {
    count: u32,
    window_start: Instant,
}

#[derive(Clone)]
pub struct RateLimiter {
    max_per_window: u32,
    inner: Arc<Mutex<HashMap<String, IpEntry>>>,
}

impl RateLimiter {
    /// `max_per_window == 0` disables limiting.
    pub fn new(max_per_window: u32) -> Self {
        RateLimiter {
            max_per_window,
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_per_window > 0
    }

    /// Returns `true` if the request is allowed, `false` if rate-limited.
    pub async fn check(&self, ip: &str) -> bool {
        self.check_at(ip, Instant::now()).await
    }

    async fn check_at(&self, ip: &str, now: Instant) -> bool {
        if !self.is_enabled() {
            return true;
        }

        let mut map = self.inner.lock().await;
        let entry = map.entry(ip.to_owned()).or_insert_with(|| IpEntry {
            count: 0,
            window_start: now,
        });

        // Reset window if expired
        if now.duration_since(entry.window_start) >= WINDOW {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count = entry.count.saturating_add(1);
        entry.count <= self.max_per_window
    }

    /// Remove entries whose window started more than five minutes ago.
    pub async fn cleanup(&self) {
        self.cleanup_at(Instant::now()).await;
    }

    async fn cleanup_at(&self, now: Instant) {
        let mut map = self.inner.lock().await;
        map.retain(|_, entry| now.duration_since(entry.window_start) < STALE_AFTER);
    }

    pub async fn tracked_ips(&self) -> usize {
        self.inner.lock().await.len()
    }
}

/// Client IP: first `X-Forwarded-For` hop, then `X-Real-IP`, then the peer address.
pub fn client_ip(request: &Request) -> String {
    let headers = request.headers();

    if let Some(first) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return first.to_owned();
    }

    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return real_ip.to_owned();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

/// Rate limit middleware for every `/api` route.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = client_ip(&request);
    if !state.rate_limiter.check(&ip).await {
        warn!(ip = %ip, "Rate limit exceeded");
        return Err(ApiError::RateLimited(
            "Too many requests, try again later".to_string(),
        ));
    }
    Ok(next.run(request).await)
}
