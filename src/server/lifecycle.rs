//! Serving lifecycle state and metrics
//!
//! Tracks uptime, in-flight requests and the draining flag, and renders
//! Prometheus text-format metrics (including the latency histogram) for
//! scrapers and load balancers.

use std::fmt::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::monitoring::PerformanceMetrics;

/// Serving state tracked via atomics for lock-free access from handlers.
#[derive(Debug)]
pub struct ServingState {
    /// Unix timestamp (ms) when the server started
    started_at: u64,
    /// Unix timestamp (ms) of the last prediction request
    last_request_at: AtomicU64,
    /// Prediction requests received (monotonic counter)
    total_requests: AtomicU64,
    /// Prediction requests currently being handled
    inflight: AtomicU64,
    /// Whether the server is draining (shutting down gracefully)
    draining: AtomicBool,
}

impl ServingState {
    pub fn new() -> Self {
        let now_ms = Self::now_ms();
        Self {
            started_at: now_ms,
            last_request_at: AtomicU64::new(now_ms),
            total_requests: AtomicU64::new(0),
            inflight: AtomicU64::new(0),
            draining: AtomicBool::new(false),
        }
    }

    /// Record that a prediction request arrived. The request counts as
    /// in flight until the returned guard drops.
    pub fn begin_request(self: &Arc<Self>) -> InflightGuard {
        self.last_request_at.store(Self::now_ms(), Ordering::Relaxed);
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.inflight.fetch_add(1, Ordering::Relaxed);
        InflightGuard {
            state: Arc::clone(self),
        }
    }

    pub fn inflight(&self) -> u64 {
        self.inflight.load(Ordering::Relaxed)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Seconds since the last prediction request.
    pub fn idle_duration_secs(&self) -> f64 {
        let elapsed_ms = Self::now_ms().saturating_sub(self.last_request_at.load(Ordering::Relaxed));
        elapsed_ms as f64 / 1000.0
    }

    pub fn uptime_secs(&self) -> f64 {
        let elapsed_ms = Self::now_ms().saturating_sub(self.started_at);
        elapsed_ms as f64 / 1000.0
    }

    /// Stop reporting ready; in-flight requests still complete.
    pub fn begin_drain(&self) {
        self.draining.store(true, Ordering::SeqCst);
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

impl Default for ServingState {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight gauge on drop.
#[derive(Debug)]
pub struct InflightGuard {
    state: Arc<ServingState>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.state.inflight.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Render Prometheus text-format metrics.
pub fn prometheus_metrics(serving: &ServingState, busy_workers: usize, metrics: &PerformanceMetrics) -> String {
    let summary = metrics.summary();
    let draining = if serving.is_draining() { 1 } else { 0 };

    let mut out = format!(
        "# HELP kolosal_vision_requests_total Prediction requests received.\n\
         # TYPE kolosal_vision_requests_total counter\n\
         kolosal_vision_requests_total {total}\n\
         # HELP kolosal_vision_predictions_total Predictions that reached the worker pool.\n\
         # TYPE kolosal_vision_predictions_total counter\n\
         kolosal_vision_predictions_total {predictions}\n\
         # HELP kolosal_vision_prediction_errors_total Failed predictions.\n\
         # TYPE kolosal_vision_prediction_errors_total counter\n\
         kolosal_vision_prediction_errors_total {errors}\n\
         # HELP kolosal_vision_inflight_requests Currently inflight requests.\n\
         # TYPE kolosal_vision_inflight_requests gauge\n\
         kolosal_vision_inflight_requests {inflight}\n\
         # HELP kolosal_vision_busy_workers Worker slots currently computing.\n\
         # TYPE kolosal_vision_busy_workers gauge\n\
         kolosal_vision_busy_workers {busy}\n\
         # HELP kolosal_vision_latency_p95_ms 95th percentile prediction latency.\n\
         # TYPE kolosal_vision_latency_p95_ms gauge\n\
         kolosal_vision_latency_p95_ms {p95:.3}\n\
         # HELP kolosal_vision_idle_duration_seconds Seconds since last request.\n\
         # TYPE kolosal_vision_idle_duration_seconds gauge\n\
         kolosal_vision_idle_duration_seconds {idle:.3}\n\
         # HELP kolosal_vision_draining Whether the server is draining.\n\
         # TYPE kolosal_vision_draining gauge\n\
         kolosal_vision_draining {draining}\n\
         # HELP kolosal_vision_uptime_seconds Server uptime in seconds.\n\
         # TYPE kolosal_vision_uptime_seconds gauge\n\
         kolosal_vision_uptime_seconds {uptime:.3}\n",
        total = serving.total_requests(),
        predictions = summary.total_requests,
        errors = summary.total_errors,
        inflight = serving.inflight(),
        busy = busy_workers,
        p95 = summary.p95_latency_ms,
        idle = serving.idle_duration_secs(),
        draining = draining,
        uptime = serving.uptime_secs(),
    );

    out.push_str(
        "# HELP kolosal_vision_latency_ms Prediction latency in milliseconds.\n\
         # TYPE kolosal_vision_latency_ms histogram\n",
    );
    for bucket in metrics.cumulative_histogram() {
        let le = if bucket.le.is_infinite() {
            "+Inf".to_string()
        } else {
            bucket.le.to_string()
        };
        let _ = writeln!(out, "kolosal_vision_latency_ms_bucket{{le=\"{}\"}} {}", le, bucket.count);
    }
    let _ = writeln!(out, "kolosal_vision_latency_ms_sum {:.3}", metrics.latency_sum_ms());
    let _ = writeln!(out, "kolosal_vision_latency_ms_count {}", summary.total_requests);

    out
}
