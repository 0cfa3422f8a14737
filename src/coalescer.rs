//! Request coalescer: ensures at most one in-flight computation per key,
//! so a burst of identical requests (e.g. the same icon fingerprint hit
//! by many clients at once) triggers a single fetch/transform rather than
//! one per request. The singleflight mechanics mirror the health
//! checker's shared-future pattern, generalized to an arbitrary key.

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use std::time::{Duration, Instant};

const STALE_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

type JoinedFuture<T> = Shared<BoxFuture<'static, T>>;

/// Coalesces concurrent callers for the same key behind one shared future.
/// `T` must be `Clone` since every waiter receives its own copy of the
/// eventual result.
pub struct RequestCoalescer<T: Clone + Send + Sync + 'static> {
    in_flight: DashMap<String, (JoinedFuture<T>, Instant)>,
}

impl<T: Clone + Send + Sync + 'static> Default for RequestCoalescer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> RequestCoalescer<T> {
    pub fn new() -> Self {
        Self {
            in_flight: DashMap::new(),
        }
    }

    /// Run `compute` for `key`, joining an already in-flight call for the
    /// same key instead of starting a second one.
    pub async fn run<F, Fut>(&self, key: &str, compute: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T> + Send + 'static,
    {
        if let Some(entry) = self.in_flight.get(key) {
            return entry.0.clone().await;
        }

        let shared = compute().boxed().shared();
        self.in_flight
            .insert(key.to_string(), (shared.clone(), Instant::now()));

        let result = shared.await;
        self.sweep_if_stale(key);
        result
    }

    fn sweep_if_stale(&self, key: &str) {
        let should_remove = self
            .in_flight
            .get(key)
            .map(|entry| entry.1.elapsed() > STALE_SWEEP_INTERVAL)
            .unwrap_or(false);
        if should_remove {
            self.in_flight.remove(key);
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

pub type SharedCoalescer<T> = Arc<RequestCoalescer<T>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn joins_concurrent_calls_for_same_key() {
        let coalescer: RequestCoalescer<u32> = RequestCoalescer::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let make_call = |calls: Arc<AtomicUsize>| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            42
        };

        let c1 = Arc::clone(&calls);
        let c2 = Arc::clone(&calls);
        let (a, b) = tokio::join!(
            coalescer.run("k", || make_call(c1)),
            coalescer.run("k", || make_call(c2)),
        );

        assert_eq!(a, 42);
        assert_eq!(b, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_run_independently() {
        let coalescer: RequestCoalescer<u32> = RequestCoalescer::new();
        let (a, b) = tokio::join!(
            coalescer.run("a", || async { 1 }),
            coalescer.run("b", || async { 2 }),
        );
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }
}
