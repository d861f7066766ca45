//! Monitoring Module
//!
//! Rolling latency and error statistics for the prediction path.

mod metrics;

pub use metrics::{HistogramBucket, MetricsSummary, PerformanceMetrics};
