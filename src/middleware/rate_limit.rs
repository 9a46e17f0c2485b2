//! Sliding-window rate limiting keyed by client address.
//!
//! Each limiter instance owns its registry: one timestamp queue per client.
//! The registry is a `DashMap`, so the evict / check / record sequence for a
//! key runs under that key's shard lock and concurrent exchanges from the
//! same client cannot both take the last slot.
//!
//! Clients whose newest timestamp has left the window are swept from the
//! registry at most once per window, so short-lived keys do not accumulate.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::Deserialize;
use tracing::warn;

use super::{Middleware, Next};
use crate::error::{Error, HttpError};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Limits for [`RateLimit`].
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { max_requests: 100, window_seconds: 60 }
    }
}

/// Rejects a client with `429` once it has made `max_requests` requests in
/// the last `window_seconds`.
pub struct RateLimit {
    config: RateLimitConfig,
    window: Duration,
    clients: DashMap<String, VecDeque<Instant>>,
    last_sweep: Mutex<Instant>,
}

/// Outcome of admitting one request.
struct Admission {
    remaining: usize,
    reset: u64,
}

impl RateLimit {
    pub fn new(config: RateLimitConfig) -> Self {
        let window = Duration::from_secs(config.window_seconds);
        Self { config, window, clients: DashMap::new(), last_sweep: Mutex::new(Instant::now()) }
    }

    /// `x-forwarded-for` (first hop), then `x-real-ip`, then the transport
    /// address, then `"unknown"`.
    fn client_key(req: &Request) -> String {
        if let Some(forwarded) = req.header("x-forwarded-for") {
            if let Some(first) = forwarded.split(',').next().map(str::trim).filter(|s| !s.is_empty()) {
                return first.to_owned();
            }
        }
        if let Some(real_ip) = req.header("x-real-ip").filter(|s| !s.is_empty()) {
            return real_ip;
        }
        req.client()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_owned())
    }

    /// Drops every client with no timestamp left in the window. Runs at most
    /// once per window; must not be called while holding a registry entry.
    fn sweep(&self, now: Instant) {
        {
            let mut last = self.last_sweep.lock().unwrap_or_else(PoisonError::into_inner);
            if now.duration_since(*last) < self.window {
                return;
            }
            *last = now;
        }
        self.clients.retain(|_, stamps| {
            stamps.back().is_some_and(|t| now.duration_since(*t) < self.window)
        });
    }

    fn admit(&self, key: String) -> Option<Admission> {
        let now = Instant::now();
        self.sweep(now);
        let mut stamps = self.clients.entry(key).or_default();
        while stamps.front().is_some_and(|t| now.duration_since(*t) >= self.window) {
            stamps.pop_front();
        }
        if stamps.len() >= self.config.max_requests {
            return None;
        }
        stamps.push_back(now);

        let epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Some(Admission {
            remaining: self.config.max_requests - stamps.len(),
            reset: (epoch + self.window).as_secs(),
        })
    }
}

impl Default for RateLimit {
    fn default() -> Self { Self::new(RateLimitConfig::default()) }
}

impl Middleware for RateLimit {
    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(self.limit(req, next))
    }
}

impl RateLimit {
    async fn limit(&self, req: Request, next: Next) -> Result<Response, Error> {
        let key = Self::client_key(&req);
        let Some(admission) = self.admit(key.clone()) else {
            warn!(client = %key, limit = self.config.max_requests, "rate limit exceeded");
            return Err(HttpError::too_many_requests("Rate limit exceeded. Too many requests.").into());
        };

        let mut res = next.run(req).await?;
        let headers = res.headers_mut();
        headers.insert("X-RateLimit-Limit", self.config.max_requests.to_string());
        headers.insert("X-RateLimit-Remaining", admission.remaining.to_string());
        headers.insert("X-RateLimit-Reset", admission.reset.to_string());
        Ok(res)
    }
}
