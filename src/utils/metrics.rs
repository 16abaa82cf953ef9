use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::types::PipelineResult;

/// Latency samples kept per upstream (oldest dropped first)
const MAX_LATENCY_SAMPLES: usize = 1024;

/// External services the backend calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Ocr,
    Translation,
    Speech,
    Currency,
}

impl Upstream {
    const ALL: [Upstream; 4] = [
        Upstream::Ocr,
        Upstream::Translation,
        Upstream::Speech,
        Upstream::Currency,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Upstream::Ocr => "ocr",
            Upstream::Translation => "translation",
            Upstream::Speech => "speech",
            Upstream::Currency => "currency",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Default)]
struct UpstreamCounters {
    calls: AtomicUsize,
    failures: AtomicUsize,
    latency_ms: RwLock<Vec<u64>>,
}

/// Global metrics collector for the application.
///
/// Tracks upstream calls, translation cache performance, pipeline outcomes and
/// per-endpoint request counts. Cheap to clone and shared across handlers.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    upstreams: [UpstreamCounters; 4],

    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    cache_size: AtomicUsize,

    cycles_success: AtomicUsize,
    cycles_empty: AtomicUsize,
    cycles_recognition_failed: AtomicUsize,
    cycles_translation_failed: AtomicUsize,
    stale_discarded: AtomicUsize,

    endpoint_counters: DashMap<String, AtomicUsize>,
    circuit_breaker_trips: DashMap<&'static str, AtomicUsize>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                upstreams: Default::default(),
                cache_hits: AtomicUsize::new(0),
                cache_misses: AtomicUsize::new(0),
                cache_size: AtomicUsize::new(0),
                cycles_success: AtomicUsize::new(0),
                cycles_empty: AtomicUsize::new(0),
                cycles_recognition_failed: AtomicUsize::new(0),
                cycles_translation_failed: AtomicUsize::new(0),
                stale_discarded: AtomicUsize::new(0),
                endpoint_counters: DashMap::new(),
                circuit_breaker_trips: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    pub fn record_upstream_call(&self, upstream: Upstream, success: bool, duration: Duration) {
        let counters = &self.inner.upstreams[upstream.index()];
        counters.calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            counters.failures.fetch_add(1, Ordering::Relaxed);
        }
        let mut latency = counters.latency_ms.write();
        if latency.len() >= MAX_LATENCY_SAMPLES {
            latency.remove(0);
        }
        latency.push(duration.as_millis() as u64);
    }

    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_cache_size(&self, size: usize) {
        self.inner.cache_size.store(size, Ordering::Relaxed);
    }

    pub fn record_cycle_outcome(&self, result: &PipelineResult) {
        let counter = match result {
            PipelineResult::Success { .. } => &self.inner.cycles_success,
            PipelineResult::Empty { .. } => &self.inner.cycles_empty,
            PipelineResult::RecognitionFailed { .. } => &self.inner.cycles_recognition_failed,
            PipelineResult::TranslationFailed { .. } => &self.inner.cycles_translation_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_discard(&self) {
        self.inner.stale_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_endpoint_request(&self, endpoint: &str) {
        self.inner
            .endpoint_counters
            .entry(endpoint.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_circuit_breaker_trip(&self, breaker: &'static str) {
        self.inner
            .circuit_breaker_trips
            .entry(breaker)
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let upstreams = Upstream::ALL
            .iter()
            .map(|&u| {
                let counters = &self.inner.upstreams[u.index()];
                let latency = counters.latency_ms.read();
                let stats = UpstreamSnapshot {
                    calls: counters.calls.load(Ordering::Relaxed),
                    failures: counters.failures.load(Ordering::Relaxed),
                    latency_avg_ms: avg(&latency),
                    latency_p50_ms: percentile(&latency, 0.5),
                    latency_p95_ms: percentile(&latency, 0.95),
                };
                (u.as_str().to_string(), stats)
            })
            .collect();

        let cache_hits = self.inner.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.inner.cache_misses.load(Ordering::Relaxed);
        let cache_total = cache_hits + cache_misses;
        let cache_hit_rate = if cache_total > 0 {
            cache_hits as f64 / cache_total as f64
        } else {
            0.0
        };

        let endpoints = self
            .inner
            .endpoint_counters
            .iter()
            .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
            .collect();

        let circuit_breaker_trips = self
            .inner
            .circuit_breaker_trips
            .iter()
            .map(|e| (e.key().to_string(), e.value().load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            upstreams,
            cache_hits,
            cache_misses,
            cache_hit_rate,
            cache_size: self.inner.cache_size.load(Ordering::Relaxed),
            cycles_success: self.inner.cycles_success.load(Ordering::Relaxed),
            cycles_empty: self.inner.cycles_empty.load(Ordering::Relaxed),
            cycles_recognition_failed: self
                .inner
                .cycles_recognition_failed
                .load(Ordering::Relaxed),
            cycles_translation_failed: self
                .inner
                .cycles_translation_failed
                .load(Ordering::Relaxed),
            stale_discarded: self.inner.stale_discarded.load(Ordering::Relaxed),
            endpoints,
            circuit_breaker_trips,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();

        out.push_str("# HELP upstream_calls_total Calls made to external services\n");
        out.push_str("# TYPE upstream_calls_total counter\n");
        for (name, stats) in &snapshot.upstreams {
            out.push_str(&format!(
                "upstream_calls_total{{service=\"{}\"}} {}\n",
                name, stats.calls
            ));
        }
        out.push_str("\n# HELP upstream_failures_total Failed calls to external services\n");
        out.push_str("# TYPE upstream_failures_total counter\n");
        for (name, stats) in &snapshot.upstreams {
            out.push_str(&format!(
                "upstream_failures_total{{service=\"{}\"}} {}\n",
                name, stats.failures
            ));
        }
        out.push_str("\n# HELP upstream_latency_avg_ms Average upstream latency in milliseconds\n");
        out.push_str("# TYPE upstream_latency_avg_ms gauge\n");
        for (name, stats) in &snapshot.upstreams {
            out.push_str(&format!(
                "upstream_latency_avg_ms{{service=\"{}\"}} {}\n",
                name, stats.latency_avg_ms
            ));
        }

        out.push_str(&format!(
            r#"
# HELP cache_hit_rate Translation cache hit rate (0.0 to 1.0)
# TYPE cache_hit_rate gauge
cache_hit_rate {}

# HELP cache_size Current translation cache size
# TYPE cache_size gauge
cache_size {}

# HELP overlay_cycles_total Overlay pipeline cycles by outcome
# TYPE overlay_cycles_total counter
overlay_cycles_total{{state="success"}} {}
overlay_cycles_total{{state="empty"}} {}
overlay_cycles_total{{state="recognition_failed"}} {}
overlay_cycles_total{{state="translation_failed"}} {}

# HELP overlay_stale_discarded_total Results dropped because a newer cycle had started
# TYPE overlay_stale_discarded_total counter
overlay_stale_discarded_total {}
"#,
            snapshot.cache_hit_rate,
            snapshot.cache_size,
            snapshot.cycles_success,
            snapshot.cycles_empty,
            snapshot.cycles_recognition_failed,
            snapshot.cycles_translation_failed,
            snapshot.stale_discarded,
        ));

        out.push_str("\n# HELP circuit_breaker_trips_total Circuit breaker trips per upstream\n");
        out.push_str("# TYPE circuit_breaker_trips_total counter\n");
        for (name, trips) in &snapshot.circuit_breaker_trips {
            out.push_str(&format!(
                "circuit_breaker_trips_total{{breaker=\"{}\"}} {}\n",
                name, trips
            ));
        }

        out.push_str(&format!(
            "\n# HELP uptime_seconds Application uptime in seconds\n# TYPE uptime_seconds counter\nuptime_seconds {}\n",
            snapshot.uptime_seconds
        ));

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSnapshot {
    pub calls: usize,
    pub failures: usize,
    pub latency_avg_ms: u64,
    pub latency_p50_ms: u64,
    pub latency_p95_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub upstreams: BTreeMap<String, UpstreamSnapshot>,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_hit_rate: f64,
    pub cache_size: usize,
    pub cycles_success: usize,
    pub cycles_empty: usize,
    pub cycles_recognition_failed: usize,
    pub cycles_translation_failed: usize,
    pub stale_discarded: usize,
    pub endpoints: BTreeMap<String, usize>,
    pub circuit_breaker_trips: BTreeMap<String, usize>,
    pub uptime_seconds: u64,
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}
