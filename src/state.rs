use std::sync::Arc;

use crate::batch;
use crate::blob_store::BlobStore;
use crate::cache::MemoryCache;
use crate::coalescer::RequestCoalescer;
use crate::config::Args;
use crate::health::HealthChecker;
use crate::index_store::IndexStore;
use crate::metrics::Metrics;
use crate::middleware::RateLimiter;
use crate::search::SearchEngine;
use crate::transform::TransformCache;

const MEMORY_CACHE_CAPACITY: usize = 500;
const MEMORY_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(300);

/// Result of resolving one icon's transformed SVG, shared by the
/// coalescer between concurrent identical requests.
pub type IconFetchResult = Result<(Arc<str>, String), String>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Args>,
    pub index_store: Arc<IndexStore>,
    pub blob_store: Arc<BlobStore>,
    pub transform_cache: Arc<TransformCache>,
    pub memory_cache: Arc<MemoryCache<Arc<str>>>,
    pub coalescer: Arc<RequestCoalescer<IconFetchResult>>,
    pub search_engine: Arc<SearchEngine>,
    pub metrics: Arc<Metrics>,
    pub health_checker: Arc<HealthChecker>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        config: Args,
        index_store: IndexStore,
        blob_store: BlobStore,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_rps, config.rate_limit_burst));
        let index_store = Arc::new(index_store);
        let blob_store = Arc::new(blob_store);

        let health_index = Arc::clone(&index_store);
        let health_blob = Arc::clone(&blob_store);
        let health_checker = Arc::new(HealthChecker::new(move || {
            let index_store = Arc::clone(&health_index);
            let blob_store = Arc::clone(&health_blob);
            async move {
                index_store.get_index().await.is_ok() && blob_store.circuit_state()
                    != crate::circuit_breaker::CircuitState::Open
            }
        }));

        Self {
            config: Arc::new(config),
            index_store,
            blob_store,
            transform_cache: Arc::new(TransformCache::default()),
            memory_cache: Arc::new(MemoryCache::new(MEMORY_CACHE_CAPACITY, MEMORY_CACHE_TTL)),
            coalescer: Arc::new(RequestCoalescer::new()),
            search_engine: Arc::new(SearchEngine::new()),
            metrics: Arc::new(Metrics::new()),
            health_checker,
            rate_limiter,
        }
    }

    pub fn batch_limits(&self) -> (usize, usize) {
        (batch::MAX_BATCH_ICONS, batch::MAX_BULK_ICONS)
    }
}
