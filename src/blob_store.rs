//! Blob store: fetches raw SVG payloads from the backing object store,
//! with in-flight request coalescing, a bounded concurrency window, and a
//! circuit breaker shared across all callers.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Semaphore;
use tracing::warn;

use crate::backend::{BackendError, ObjectStore};
use crate::circuit_breaker::CircuitBreaker;
use crate::validator;

const MAX_CONCURRENT_READS: usize = 50;
const SLOW_READ_THRESHOLD: Duration = Duration::from_millis(500);
const BATCH_WINDOW: usize = 10;
const STALE_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Blob {
    pub body: Arc<String>,
    pub etag: String,
}

#[derive(Debug, Clone)]
pub enum GetOutcome {
    Hit(Blob),
    NotModified,
    NotFound,
}

#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    #[error("blob store unavailable")]
    Unavailable,
    #[error("invalid blob key")]
    InvalidKey,
    #[error("payload failed validation: {0}")]
    InvalidPayload(String),
}

type InFlight = Shared<BoxFuture<'static, Result<Blob, String>>>;

/// Fetches and validates SVG blobs, deduplicating concurrent requests for
/// the same key and bounding total concurrent backend reads.
pub struct BlobStore {
    backend: Arc<ObjectStore>,
    breaker: CircuitBreaker,
    semaphore: Semaphore,
    in_flight: DashMap<String, (InFlight, Instant)>,
}

impl BlobStore {
    pub fn new(backend: ObjectStore) -> Self {
        Self {
            backend: Arc::new(backend),
            breaker: CircuitBreaker::new(5, Duration::from_secs(30)),
            semaphore: Semaphore::new(MAX_CONCURRENT_READS),
            in_flight: DashMap::new(),
        }
    }

    /// Fetch a single blob by key. `if_none_match` enables a 304-style
    /// short-circuit when the caller already holds a matching ETag.
    pub async fn get(
        &self,
        key: &str,
        if_none_match: Option<&str>,
    ) -> Result<GetOutcome, BlobStoreError> {
        let Some(sanitized) = validator::sanitize_key(key) else {
            return Err(BlobStoreError::InvalidKey);
        };

        if !self.breaker.allow_request() {
            return Err(BlobStoreError::Unavailable);
        }

        let fut = self.fetch_or_join(sanitized.clone());
        let result = fut.await;
        self.sweep_if_stale(&sanitized);

        match result {
            Ok(blob) => {
                self.breaker.record_success();
                if crate::cache::etag_matches(if_none_match, &blob.etag) {
                    Ok(GetOutcome::NotModified)
                } else {
                    Ok(GetOutcome::Hit(blob))
                }
            }
            Err(e) if e == "not_found" => Ok(GetOutcome::NotFound),
            Err(e) => {
                self.breaker.record_failure();
                Err(BlobStoreError::InvalidPayload(e))
            }
        }
    }

    /// Fetch many keys, chunked into windows to bound backend fan-out.
    /// Each slot carries its own `Result` so one failure doesn't sink the
    /// rest of the batch.
    pub async fn batch_get(&self, keys: &[String]) -> Vec<Result<GetOutcome, BlobStoreError>> {
        let mut results = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(BATCH_WINDOW) {
            let futures = chunk.iter().map(|k| self.get(k, None));
            results.extend(futures::future::join_all(futures).await);
        }
        results
    }

    fn fetch_or_join(&self, key: String) -> InFlight {
        if let Some(entry) = self.in_flight.get(&key) {
            return entry.0.clone();
        }

        let backend = Arc::clone(&self.backend);
        let key_for_fetch = key.clone();
        let shared = async move {
            let started = Instant::now();
            let bytes = backend
                .get(&key_for_fetch)
                .await
                .map_err(|e| match e {
                    BackendError::NotFound => "not_found".to_string(),
                    BackendError::Io(msg) => msg,
                })?;

            let elapsed = started.elapsed();
            if elapsed > SLOW_READ_THRESHOLD {
                warn!(key = %key_for_fetch, elapsed_ms = elapsed.as_millis() as u64, "slow blob read");
            }

            let body = String::from_utf8(bytes).map_err(|e| e.to_string())?;
            validate_svg_body(&body)?;

            let etag = weak_etag(&body);
            Ok(Blob {
                body: Arc::new(body),
                etag,
            })
        }
        .boxed()
        .shared();

        self.in_flight.insert(key.clone(), (shared.clone(), Instant::now()));
        shared
    }

    fn sweep_if_stale(&self, key: &str) {
        if let Some(entry) = self.in_flight.get(key) {
            if entry.1.elapsed() > STALE_SWEEP_INTERVAL {
                drop(entry);
                self.in_flight.remove(key);
            }
        }
    }

    pub async fn acquire_read_permit(&self) -> tokio::sync::SemaphorePermit<'_> {
        self.semaphore
            .acquire()
            .await
            .expect("blob store semaphore never closed")
    }

    pub fn circuit_state(&self) -> crate::circuit_breaker::CircuitState {
        self.breaker.state()
    }
}

/// Reject payloads that are not well-formed SVG or that smuggle scripts
/// or inline event handlers past the object store.
fn validate_svg_body(body: &str) -> Result<(), String> {
    if !body.contains("<svg") || !body.contains("</svg>") {
        return Err("missing <svg>/</svg> wrapper".to_string());
    }
    let lower = body.to_lowercase();
    if lower.contains("<script") {
        return Err("payload contains a <script> element".to_string());
    }
    if lower.contains("javascript:") {
        return Err("payload contains a javascript: URL".to_string());
    }
    if validator::ON_EVENT_RE().is_match(&lower) {
        return Err("payload contains an inline event handler".to_string());
    }
    Ok(())
}

fn weak_etag(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("W/\"{:x}\"", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_svg_wrapper() {
        assert!(validate_svg_body("<div>not an icon</div>").is_err());
    }

    #[test]
    fn rejects_script_tag() {
        assert!(validate_svg_body("<svg><script>evil()</script></svg>").is_err());
    }

    #[test]
    fn rejects_inline_event_handler() {
        assert!(validate_svg_body(r#"<svg onload="evil()"><path d="M0 0"/></svg>"#).is_err());
    }

    #[test]
    fn accepts_clean_svg() {
        assert!(validate_svg_body(r#"<svg viewBox="0 0 24 24"><path d="M0 0"/></svg>"#).is_ok());
    }

    #[test]
    fn etag_is_stable_for_same_body() {
        let body = "<svg></svg>";
        assert_eq!(weak_etag(body), weak_etag(body));
    }
}
