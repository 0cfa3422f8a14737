//! In-process memory cache tier plus the HTTP cache-header helpers shared
//! by every response path.

use axum::http::{HeaderMap, HeaderValue, header};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
    access_count: u64,
    last_accessed: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// Insertion/promotion order, most-recently-used at the back.
    order: VecDeque<String>,
    stats: CacheStats,
}

/// An in-process LRU cache with TTL expiry and a hard capacity bound.
///
/// On read, a hit is promoted to the back of the order queue. On write past
/// capacity, the LRU victim (the front of the queue) is evicted.
pub struct MemoryCache<V: Clone> {
    inner: Mutex<Inner<V>>,
    capacity: usize,
    ttl: Duration,
}

impl<V: Clone> MemoryCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                stats: CacheStats::default(),
            }),
            capacity,
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        let is_expired = match inner.entries.get(key) {
            Some(entry) => entry.expires_at <= now,
            None => {
                inner.stats.misses += 1;
                return None;
            }
        };

        if is_expired {
            inner.entries.remove(key);
            inner.order.retain(|k| k != key);
            inner.stats.misses += 1;
            return None;
        }

        inner.stats.hits += 1;
        let value = {
            let entry = inner.entries.get_mut(key).expect("checked above");
            entry.access_count += 1;
            entry.last_accessed = now;
            entry.value.clone()
        };
        inner.order.retain(|k| k != key);
        inner.order.push_back(key.to_string());

        Some(value)
    }

    pub fn insert(&self, key: String, value: V) {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            if let Some(victim) = inner.order.pop_front() {
                inner.entries.remove(&victim);
                inner.stats.evictions += 1;
            }
        }

        inner.order.retain(|k| k != &key);
        inner.order.push_back(key.clone());
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + self.ttl,
                access_count: 0,
                last_accessed: now,
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the canonical cache key for a transformed icon request, stable
/// across the memory cache, the response-level coalescer, and ETag
/// comparison.
#[allow(clippy::too_many_arguments)]
pub fn icon_cache_key(
    source: &str,
    name: &str,
    variant: &str,
    size: u32,
    stroke_width: f64,
    color: &str,
    rotate: Option<f64>,
    mirror: bool,
    class_name: Option<&str>,
) -> String {
    format!(
        "icon:{source}:{name}:{variant}:{size}:{stroke_width}:{color}:{}:{}:{}",
        rotate.map(|r| r.to_string()).unwrap_or_default(),
        mirror,
        class_name.unwrap_or(""),
    )
}

/// A pluggable downstream cache collaborator, reached asynchronously and
/// never awaited on the request's hot path. A no-op is used when no such
/// collaborator is configured.
#[async_trait::async_trait]
pub trait EdgeCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn put(&self, key: String, body: Vec<u8>);
}

pub struct NoopEdgeCache;

#[async_trait::async_trait]
impl EdgeCache for NoopEdgeCache {
    async fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }
    async fn put(&self, _key: String, _body: Vec<u8>) {}
}

/// Apply the fixed cache-control/ETag/debug-header set to an icon response.
pub fn apply_cache_headers(
    headers: &mut HeaderMap,
    etag: &str,
    cache_tag: &str,
    cache_status: &str,
    cache_layer: &str,
    response_time_ms: u64,
) {
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=86400, stale-while-revalidate=86400, immutable"),
    );
    if let Ok(value) = HeaderValue::from_str(etag) {
        headers.insert(header::ETAG, value);
    }
    if let Ok(value) = HeaderValue::from_str(cache_tag) {
        headers.insert("Cache-Tag", value);
    }
    headers.insert(header::VARY, HeaderValue::from_static("Accept"));
    if let Ok(value) = HeaderValue::from_str(cache_status) {
        headers.insert("X-Cache", value);
    }
    if let Ok(value) = HeaderValue::from_str(cache_layer) {
        headers.insert("X-Cache-Layer", value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{response_time_ms}ms")) {
        headers.insert("X-Response-Time", value);
    }
}

/// Whether a request's `If-None-Match` header matches the current ETag,
/// allowing a 304 short-circuit.
pub fn etag_matches(if_none_match: Option<&str>, current_etag: &str) -> bool {
    match if_none_match {
        Some(value) => value
            .split(',')
            .map(|v| v.trim().trim_matches('"'))
            .any(|v| v == "*" || v == current_etag.trim_matches('"')),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_lru_entry_past_capacity() {
        let cache: MemoryCache<String> = MemoryCache::new(2, Duration::from_secs(60));
        cache.insert("a".into(), "1".into());
        cache.insert("b".into(), "2".into());
        cache.insert("c".into(), "3".into());

        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b"), Some("2".into()));
        assert_eq!(cache.get("c"), Some("3".into()));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn promotes_on_read() {
        let cache: MemoryCache<String> = MemoryCache::new(2, Duration::from_secs(60));
        cache.insert("a".into(), "1".into());
        cache.insert("b".into(), "2".into());
        cache.get("a");
        cache.insert("c".into(), "3".into());

        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a"), Some("1".into()));
    }

    #[test]
    fn expires_on_ttl() {
        let cache: MemoryCache<String> = MemoryCache::new(10, Duration::from_millis(10));
        cache.insert("a".into(), "1".into());
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn hit_rate_tracks_hits_and_misses() {
        let cache: MemoryCache<String> = MemoryCache::new(10, Duration::from_secs(60));
        cache.insert("a".into(), "1".into());
        cache.get("a");
        cache.get("missing");
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn etag_match_handles_wildcard_and_quotes() {
        assert!(etag_matches(Some("\"abc\""), "\"abc\""));
        assert!(etag_matches(Some("*"), "\"abc\""));
        assert!(!etag_matches(Some("\"xyz\""), "\"abc\""));
        assert!(!etag_matches(None, "\"abc\""));
    }
}
