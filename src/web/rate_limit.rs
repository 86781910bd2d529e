//! Per-client fixed-window rate limiting

use super::error::ApiError;
use super::AppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_LIMIT: u32 = 100;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

struct Visitor {
    remaining: u32,
    window_start: Instant,
}

/// Allows `limit` requests per client key in each window
pub struct RateLimiter {
    visitors: Mutex<HashMap<String, Visitor>>,
    limit: u32,
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            visitors: Mutex::new(HashMap::new()),
            limit,
            window,
        }
    }

    fn visitors(&self) -> MutexGuard<'_, HashMap<String, Visitor>> {
        self.visitors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a request from `key`; false once its window budget is spent
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut visitors = self.visitors();
        let Some(visitor) = visitors.get_mut(key) else {
            if self.limit == 0 {
                return false;
            }
            visitors.insert(
                key.to_string(),
                Visitor {
                    remaining: self.limit - 1,
                    window_start: now,
                },
            );
            return true;
        };

        if now.duration_since(visitor.window_start) > self.window {
            visitor.window_start = now;
            visitor.remaining = self.limit;
        }
        if visitor.remaining == 0 {
            return false;
        }
        visitor.remaining -= 1;
        true
    }

    /// Forget clients whose window started more than two windows ago
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let stale_after = self.window * 2;
        let mut visitors = self.visitors();
        let before = visitors.len();
        visitors.retain(|_, v| now.duration_since(v.window_start) <= stale_after);
        before - visitors.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.visitors().len()
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }
}

/// Identify the caller: first `X-Forwarded-For` hop, else the peer address
pub fn client_key(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware rejecting clients over their budget with 429
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    if !state.rate_limiter.allow(&key) {
        log::warn!("Rate limit exceeded for {}", key);
        return ApiError::RateLimited {
            retry_after: state.rate_limiter.retry_after_secs(),
        }
        .into_response();
    }
    next.run(request).await
}
