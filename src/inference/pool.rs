//! Bounded worker pool with a per-request deadline

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{error, warn};

use super::config::InferenceConfig;
use super::service::PredictionService;
use crate::error::{InferenceError, PredictError};
use crate::model::InferenceArtifact;
use crate::monitoring::PerformanceMetrics;
use crate::options::RequestOptions;
use crate::postprocessing::PredictionResult;
use crate::preprocessing::RawImage;

/// Runs predictions on the blocking thread pool, at most `max_concurrency`
/// at a time.
///
/// The deadline covers the wait for a permit and the computation. A request
/// that misses it gets [`PredictError::Timeout`]; its computation may still
/// finish in the background, but its result is dropped and the permit is
/// released only once the worker actually returns.
///
/// Every call to [`predict`](Self::predict) records exactly one latency and
/// at most one error, whatever the outcome.
#[derive(Debug, Clone)]
pub struct InferencePool {
    service: Arc<PredictionService>,
    metrics: Arc<PerformanceMetrics>,
    permits: Arc<Semaphore>,
    max_concurrency: usize,
    timeout: Duration,
}

impl InferencePool {
    pub fn new(service: Arc<PredictionService>, config: &InferenceConfig) -> Self {
        let max_concurrency = config.max_concurrency.max(1);
        Self {
            service,
            metrics: Arc::new(PerformanceMetrics::new(config.metrics_window)),
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            timeout: config.timeout(),
        }
    }

    /// Build the service and pool around a loaded artifact
    pub fn for_artifact(artifact: Arc<InferenceArtifact>, config: &InferenceConfig) -> Self {
        Self::new(Arc::new(PredictionService::new(artifact)), config)
    }

    pub fn service(&self) -> &Arc<PredictionService> {
        &self.service
    }

    pub fn metrics(&self) -> &Arc<PerformanceMetrics> {
        &self.metrics
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Number of predictions currently holding a worker slot
    pub fn busy(&self) -> usize {
        self.max_concurrency
            .saturating_sub(self.permits.available_permits())
    }

    pub async fn predict(
        &self,
        raw: RawImage,
        options: RequestOptions,
    ) -> Result<PredictionResult, PredictError> {
        let start = Instant::now();
        let result = self.predict_with_deadline(raw, options).await;

        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.metrics.record_prediction(latency_ms, result.is_ok());
        result
    }

    async fn predict_with_deadline(
        &self,
        raw: RawImage,
        options: RequestOptions,
    ) -> Result<PredictionResult, PredictError> {
        let service = Arc::clone(&self.service);
        let permits = Arc::clone(&self.permits);

        let work = async move {
            let permit = permits.acquire_owned().await.map_err(|_| {
                PredictError::Inference(InferenceError::Runtime(
                    "worker pool is closed".to_string(),
                ))
            })?;

            // CPU-bound, so keep it off the async workers.
            let joined = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                service.predict(raw, options)
            })
            .await;

            match joined {
                Ok(result) => result,
                Err(join_err) => {
                    error!(error = %join_err, "Prediction worker panicked");
                    Err(PredictError::Inference(InferenceError::Runtime(
                        "prediction worker terminated unexpectedly".to_string(),
                    )))
                }
            }
        };

        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Prediction deadline exceeded");
                Err(PredictError::Timeout(self.timeout))
            }
        }
    }
}
