//! In-process metrics: request counters, fixed-bucket histograms, and
//! rolling timer summaries, exportable as JSON or Prometheus text.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

const TIMER_WINDOW: usize = 1000;
const LATENCY_BUCKETS_MS: &[f64] = &[1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0];

#[derive(Default)]
struct Counter(AtomicU64);

impl Counter {
    fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
    fn incr_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }
    fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

struct Histogram {
    buckets: Vec<AtomicU64>,
    sum_ms: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    fn new() -> Self {
        Self {
            buckets: (0..=LATENCY_BUCKETS_MS.len()).map(|_| AtomicU64::new(0)).collect(),
            sum_ms: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    fn observe(&self, ms: f64) {
        let idx = LATENCY_BUCKETS_MS
            .iter()
            .position(|b| ms <= *b)
            .unwrap_or(LATENCY_BUCKETS_MS.len());
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
        self.sum_ms.fetch_add(ms as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

/// A bounded rolling window of recent timer samples, used to compute
/// percentile summaries without unbounded memory growth.
struct TimerWindow {
    samples: Mutex<Vec<f64>>,
}

impl TimerWindow {
    fn new() -> Self {
        Self {
            samples: Mutex::new(Vec::with_capacity(TIMER_WINDOW)),
        }
    }

    fn record(&self, ms: f64) {
        let mut samples = self.samples.lock();
        if samples.len() >= TIMER_WINDOW {
            samples.remove(0);
        }
        samples.push(ms);
    }

    fn percentiles(&self) -> (f64, f64, f64) {
        let mut samples = self.samples.lock().clone();
        if samples.is_empty() {
            return (0.0, 0.0, 0.0);
        }
        samples.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let at = |p: f64| -> f64 {
            let idx = ((samples.len() as f64 - 1.0) * p).round() as usize;
            samples[idx.min(samples.len() - 1)]
        };
        (at(0.50), at(0.95), at(0.99))
    }
}

/// Process-wide metrics registry. Cheap to clone (it's an `Arc` inside
/// `AppState`); every counter/histogram is independently lock-light.
#[derive(Default)]
pub struct Metrics {
    counters: Mutex<HashMap<&'static str, std::sync::Arc<Counter>>>,
    histograms: Mutex<HashMap<&'static str, std::sync::Arc<Histogram>>>,
    timers: Mutex<HashMap<&'static str, std::sync::Arc<TimerWindow>>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, name: &'static str) {
        self.counter(name).incr();
    }

    pub fn incr_by(&self, name: &'static str, n: u64) {
        self.counter(name).incr_by(n);
    }

    pub fn observe_latency(&self, name: &'static str, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        self.histogram(name).observe(ms);
        self.timer(name).record(ms);
    }

    fn counter(&self, name: &'static str) -> std::sync::Arc<Counter> {
        self.counters
            .lock()
            .entry(name)
            .or_insert_with(|| std::sync::Arc::new(Counter::default()))
            .clone()
    }

    fn histogram(&self, name: &'static str) -> std::sync::Arc<Histogram> {
        self.histograms
            .lock()
            .entry(name)
            .or_insert_with(|| std::sync::Arc::new(Histogram::new()))
            .clone()
    }

    fn timer(&self, name: &'static str) -> std::sync::Arc<TimerWindow> {
        self.timers
            .lock()
            .entry(name)
            .or_insert_with(|| std::sync::Arc::new(TimerWindow::new()))
            .clone()
    }

    /// Dump every known metric as a JSON document.
    pub fn to_json(&self) -> serde_json::Value {
        let counters: serde_json::Map<String, serde_json::Value> = self
            .counters
            .lock()
            .iter()
            .map(|(name, c)| (name.to_string(), serde_json::json!(c.get())))
            .collect();

        let timers: serde_json::Map<String, serde_json::Value> = self
            .timers
            .lock()
            .iter()
            .map(|(name, t)| {
                let (p50, p95, p99) = t.percentiles();
                (
                    name.to_string(),
                    serde_json::json!({ "p50_ms": p50, "p95_ms": p95, "p99_ms": p99 }),
                )
            })
            .collect();

        serde_json::json!({ "counters": counters, "timers": timers })
    }

    /// Render in the Prometheus text exposition format.
    pub fn to_prometheus_text(&self) -> String {
        let mut out = String::new();
        for (name, counter) in self.counters.lock().iter() {
            out.push_str(&format!("# TYPE {name} counter\n{name} {}\n", counter.get()));
        }
        for (name, hist) in self.histograms.lock().iter() {
            out.push_str(&format!("# TYPE {name}_ms histogram\n"));
            let mut cumulative = 0u64;
            for (bucket, count) in LATENCY_BUCKETS_MS.iter().zip(hist.buckets.iter()) {
                cumulative += count.load(Ordering::Relaxed);
                out.push_str(&format!(
                    "{name}_ms_bucket{{le=\"{bucket}\"}} {cumulative}\n"
                ));
            }
            cumulative += hist.buckets[LATENCY_BUCKETS_MS.len()].load(Ordering::Relaxed);
            out.push_str(&format!("{name}_ms_bucket{{le=\"+Inf\"}} {cumulative}\n"));
            out.push_str(&format!(
                "{name}_ms_sum {}\n{name}_ms_count {}\n",
                hist.sum_ms.load(Ordering::Relaxed),
                hist.count.load(Ordering::Relaxed),
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = Metrics::new();
        metrics.incr("requests_total");
        metrics.incr("requests_total");
        metrics.incr_by("requests_total", 3);
        assert_eq!(metrics.counter("requests_total").get(), 5);
    }

    #[test]
    fn timer_percentiles_are_monotonic() {
        let metrics = Metrics::new();
        for ms in [1.0, 5.0, 10.0, 50.0, 100.0] {
            metrics.observe_latency("icon_fetch", Duration::from_secs_f64(ms / 1000.0));
        }
        let json = metrics.to_json();
        let p50 = json["timers"]["icon_fetch"]["p50_ms"].as_f64().unwrap();
        let p99 = json["timers"]["icon_fetch"]["p99_ms"].as_f64().unwrap();
        assert!(p99 >= p50);
    }

    #[test]
    fn prometheus_export_contains_counter_line() {
        let metrics = Metrics::new();
        metrics.incr("cache_hits_total");
        let text = metrics.to_prometheus_text();
        assert!(text.contains("cache_hits_total 1"));
    }
}
