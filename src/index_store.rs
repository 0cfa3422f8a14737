//! Index store: the icon index, inverted index, and synonym map, each
//! fetched from the backing object store and cached in-process with a
//! short TTL so a hot deploy doesn't hammer the backend on every request.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::warn;

use crate::backend::{BackendError, ObjectStore};
use crate::circuit_breaker::CircuitBreaker;
use crate::models::{IconIndex, InvertedIndex, SynonymMap};

const INDEX_KEY: &str = "index.json";
const INVERTED_INDEX_KEY: &str = "inverted-index.json";
const SYNONYMS_KEY: &str = "synonyms.json";
const REFRESH_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum IndexStoreError {
    #[error("index backend unavailable")]
    Unavailable,
    #[error("index payload malformed: {0}")]
    Malformed(String),
}

/// Fetches and caches the three index-store documents. Each document has
/// its own 60s TTL cache and its own circuit breaker so a degraded
/// inverted index doesn't take down plain icon lookups.
pub struct IndexStore {
    backend: ObjectStore,
    index_cache: Cache<(), Arc<IconIndex>>,
    inverted_cache: Cache<(), Arc<InvertedIndex>>,
    synonym_cache: Cache<(), Arc<SynonymMap>>,
    breaker: CircuitBreaker,
}

impl IndexStore {
    pub fn new(backend: ObjectStore) -> Self {
        Self {
            backend,
            index_cache: Cache::builder().time_to_live(REFRESH_TTL).max_capacity(1).build(),
            inverted_cache: Cache::builder().time_to_live(REFRESH_TTL).max_capacity(1).build(),
            synonym_cache: Cache::builder().time_to_live(REFRESH_TTL).max_capacity(1).build(),
            breaker: CircuitBreaker::new(5, Duration::from_secs(30)),
        }
    }

    /// The current icon index, with its ETag derived from a content hash.
    /// The result is cached for up to 60 seconds.
    pub async fn get_index(&self) -> Result<Arc<IconIndex>, IndexStoreError> {
        if let Some(cached) = self.index_cache.get(&()).await {
            return Ok(cached);
        }

        if !self.breaker.allow_request() {
            return Err(IndexStoreError::Unavailable);
        }

        match self.fetch_index().await {
            Ok(index) => {
                self.breaker.record_success();
                let index = Arc::new(index);
                self.index_cache.insert((), index.clone()).await;
                Ok(index)
            }
            Err(e) => {
                self.breaker.record_failure();
                warn!(error = %e, "index store: failed to refresh icon index");
                Err(IndexStoreError::Unavailable)
            }
        }
    }

    /// Current index plus a weak ETag for conditional-request handling.
    pub async fn get_index_with_etag(&self) -> Result<(Arc<IconIndex>, String), IndexStoreError> {
        let index = self.get_index().await?;
        let etag = format!(
            "W/\"{}-{}\"",
            index.stats.total_icons, index.stats.last_updated
        );
        Ok((index, etag))
    }

    /// The inverted index, if present. Absence is not an error: callers
    /// fall back to a linear scan over the icon index.
    pub async fn get_inverted_index(&self) -> Option<Arc<InvertedIndex>> {
        if let Some(cached) = self.inverted_cache.get(&()).await {
            return Some(cached);
        }
        match self.backend.get(INVERTED_INDEX_KEY).await {
            Ok(bytes) => match serde_json::from_slice::<InvertedIndex>(&bytes) {
                Ok(parsed) => {
                    let arc = Arc::new(parsed);
                    self.inverted_cache.insert((), arc.clone()).await;
                    Some(arc)
                }
                Err(e) => {
                    warn!(error = %e, "index store: inverted index malformed, falling back to linear search");
                    None
                }
            },
            Err(BackendError::NotFound) => None,
            Err(e) => {
                warn!(error = %e, "index store: inverted index unavailable, falling back to linear search");
                None
            }
        }
    }

    /// The synonym map, if present. Absence simply disables synonym
    /// expansion in search.
    pub async fn get_synonyms(&self) -> Option<Arc<SynonymMap>> {
        if let Some(cached) = self.synonym_cache.get(&()).await {
            return Some(cached);
        }
        match self.backend.get(SYNONYMS_KEY).await {
            Ok(bytes) => match serde_json::from_slice::<SynonymMap>(&bytes) {
                Ok(parsed) => {
                    let arc = Arc::new(parsed);
                    self.synonym_cache.insert((), arc.clone()).await;
                    Some(arc)
                }
                Err(e) => {
                    warn!(error = %e, "index store: synonym map malformed");
                    None
                }
            },
            Err(_) => None,
        }
    }

    async fn fetch_index(&self) -> Result<IconIndex, IndexStoreError> {
        let bytes = self
            .backend
            .get(INDEX_KEY)
            .await
            .map_err(|e| IndexStoreError::Malformed(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| IndexStoreError::Malformed(e.to_string()))
    }

    pub fn circuit_state(&self) -> crate::circuit_breaker::CircuitState {
        self.breaker.state()
    }
}
