//! Prediction latency and error tracking
//!
//! All mutable collections sit under one `RwLock` so a single
//! `record_latency` call takes a single lock. Counters are lock-free atomics.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Instant;

/// Histogram bucket for latency distribution
#[derive(Debug, Clone, Serialize)]
pub struct HistogramBucket {
    /// Upper bound of this bucket (in milliseconds)
    pub le: f64,
    /// Count of observations in this bucket
    pub count: u64,
}

struct MetricsInner {
    latencies: VecDeque<f64>,
    latency_histogram: Vec<HistogramBucket>,
    latency_sum_ms: f64,
}

/// Rolling prediction metrics shared by all request handlers
pub struct PerformanceMetrics {
    window_size: usize,
    inner: RwLock<MetricsInner>,
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    start_time: Instant,
}

impl std::fmt::Debug for PerformanceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMetrics")
            .field("window_size", &self.window_size)
            .field("total_requests", &self.total_requests())
            .field("total_errors", &self.total_errors())
            .finish()
    }
}

impl PerformanceMetrics {
    /// Create a collector keeping the last `window_size` latencies
    pub fn new(window_size: usize) -> Self {
        let latency_histogram = [1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, f64::INFINITY]
            .into_iter()
            .map(|le| HistogramBucket { le, count: 0 })
            .collect();

        Self {
            window_size: window_size.max(1),
            inner: RwLock::new(MetricsInner {
                latencies: VecDeque::with_capacity(window_size.max(1)),
                latency_histogram,
                latency_sum_ms: 0.0,
            }),
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record the latency of one finished prediction
    pub fn record_latency(&self, latency_ms: f64) {
        if let Ok(mut inner) = self.inner.write() {
            inner.latencies.push_back(latency_ms);
            inner.latency_sum_ms += latency_ms;
            if inner.latencies.len() > self.window_size {
                inner.latencies.pop_front();
            }

            for bucket in inner.latency_histogram.iter_mut() {
                if latency_ms <= bucket.le {
                    bucket.count += 1;
                    break;
                }
            }
        }

        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed prediction
    pub fn record_error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one finished request: its latency and, if it failed, an error
    pub fn record_prediction(&self, latency_ms: f64, success: bool) {
        self.record_latency(latency_ms);
        if !success {
            self.record_error();
        }
    }

    pub fn avg_latency(&self) -> f64 {
        self.inner
            .read()
            .map(|inner| {
                if inner.latencies.is_empty() {
                    0.0
                } else {
                    inner.latencies.iter().sum::<f64>() / inner.latencies.len() as f64
                }
            })
            .unwrap_or(0.0)
    }

    pub fn max_latency(&self) -> f64 {
        self.inner
            .read()
            .map(|inner| inner.latencies.iter().copied().fold(0.0, f64::max))
            .unwrap_or(0.0)
    }

    /// Percentile latency over the rolling window.
    /// Uses quickselect instead of a full sort.
    pub fn percentile_latency(&self, percentile: f64) -> f64 {
        self.inner
            .read()
            .map(|inner| {
                if inner.latencies.is_empty() {
                    return 0.0;
                }

                let mut data: Vec<f64> = inner.latencies.iter().copied().collect();
                let idx = ((percentile / 100.0) * (data.len() - 1) as f64) as usize;
                let idx = idx.min(data.len() - 1);
                data.select_nth_unstable_by(idx, |a, b| {
                    a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
                });
                data[idx]
            })
            .unwrap_or(0.0)
    }

    /// Per-bucket counts; each latency lands only in the first bucket whose
    /// bound it does not exceed
    pub fn histogram(&self) -> Vec<HistogramBucket> {
        self.inner
            .read()
            .map(|inner| inner.latency_histogram.clone())
            .unwrap_or_default()
    }

    /// Running counts in Prometheus form: each bucket counts every
    /// latency `<= le`, so the last one equals the number of requests
    pub fn cumulative_histogram(&self) -> Vec<HistogramBucket> {
        let mut running = 0;
        self.histogram()
            .into_iter()
            .map(|bucket| {
                running += bucket.count;
                HistogramBucket { le: bucket.le, count: running }
            })
            .collect()
    }

    /// Sum of every recorded latency since startup
    pub fn latency_sum_ms(&self) -> f64 {
        self.inner
            .read()
            .map(|inner| inner.latency_sum_ms)
            .unwrap_or(0.0)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }

    pub fn error_rate(&self) -> f64 {
        let requests = self.total_requests();
        let errors = self.total_errors();
        if requests > 0 {
            (errors as f64 / requests as f64).min(1.0)
        } else {
            0.0
        }
    }

    pub fn uptime_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    /// Snapshot of all metrics
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_requests: self.total_requests(),
            total_errors: self.total_errors(),
            error_rate: self.error_rate(),
            avg_latency_ms: self.avg_latency(),
            max_latency_ms: self.max_latency(),
            p50_latency_ms: self.percentile_latency(50.0),
            p95_latency_ms: self.percentile_latency(95.0),
            p99_latency_ms: self.percentile_latency(99.0),
            uptime_secs: self.uptime_secs(),
        }
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub total_requests: u64,
    pub total_errors: u64,
    pub error_rate: f64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub uptime_secs: f64,
}
