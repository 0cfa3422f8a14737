//! Per-client token-bucket rate limiting.

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// One token bucket per client key (remote IP, falling back to a shared
/// bucket when no connection info is available), refilled continuously
/// at `rps` and capped at `burst`.
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    rps: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(rps: f64, burst: u32) -> Self {
        Self {
            buckets: DashMap::new(),
            rps,
            burst: burst as f64,
        }
    }

    /// Attempt to consume one token for `key`. Returns `Ok(remaining)` if
    /// allowed, `Err(retry_after_secs)` otherwise.
    pub fn check(&self, key: &str) -> Result<u32, u64> {
        let now = Instant::now();
        let mut bucket = self.buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: self.burst,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rps).min(self.burst);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(bucket.tokens.floor() as u32)
        } else {
            let deficit = 1.0 - bucket.tokens;
            let retry_after = (deficit / self.rps).ceil() as u64;
            Err(retry_after.max(1))
        }
    }
}

pub async fn rate_limit_layer(
    State(limiter): State<Arc<RateLimiter>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let key = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match limiter.check(&key) {
        Ok(remaining) => {
            let mut response = next.run(request).await;
            if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
                response.headers_mut().insert("X-RateLimit-Remaining", value);
            }
            response
        }
        Err(retry_after) => {
            let error = crate::error::ApiError::RateLimited {
                retry_after_secs: retry_after,
            };
            axum::response::IntoResponse::into_response(error)
        }
    }
}

#[allow(dead_code)]
fn _assert_body_type(_: Body) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_burst_then_limits() {
        let limiter = RateLimiter::new(1.0, 3);
        assert!(limiter.check("client").is_ok());
        assert!(limiter.check("client").is_ok());
        assert!(limiter.check("client").is_ok());
        assert!(limiter.check("client").is_err());
    }

    #[test]
    fn refills_over_time() {
        let limiter = RateLimiter::new(1000.0, 1);
        assert!(limiter.check("client").is_ok());
        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.check("client").is_ok());
    }

    #[test]
    fn separate_keys_have_independent_buckets() {
        let limiter = RateLimiter::new(1.0, 1);
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("b").is_ok());
    }
}
