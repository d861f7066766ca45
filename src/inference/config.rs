//! Inference configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker pool and deadline settings for prediction requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Deadline per request, covering the wait for a worker and the
    /// computation itself
    pub timeout_ms: u64,

    /// Maximum number of predictions computing at the same time
    pub max_concurrency: usize,

    /// Number of recent latencies kept for percentile statistics
    pub metrics_window: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            metrics_window: 1000,
        }
    }
}

impl InferenceConfig {
    /// Create a new inference configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the per-request deadline
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Builder method to set the worker pool size
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    /// Builder method to set the latency window
    pub fn with_metrics_window(mut self, window: usize) -> Self {
        self.metrics_window = window;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InferenceConfig::default();
        assert_eq!(config.timeout_ms, 10_000);
        assert!(config.max_concurrency >= 1);
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_builder_pattern() {
        let config = InferenceConfig::new()
            .with_timeout_ms(250)
            .with_max_concurrency(0)
            .with_metrics_window(50);

        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.metrics_window, 50);
    }
}
