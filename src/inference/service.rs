//! Prediction service: preprocess, infer, postprocess

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use crate::error::PredictError;
use crate::model::InferenceArtifact;
use crate::options::RequestOptions;
use crate::postprocessing::{PredictionResult, Postprocessor};
use crate::preprocessing::{Preprocessor, RawImage};

/// Runs the whole prediction path for one image.
///
/// Holds only the shared read-only artifact and stateless stage
/// configuration; nothing about a request outlives the call. Errors from
/// every stage propagate unchanged and are never retried. Request metrics
/// are recorded by the caller ([`InferencePool`](super::InferencePool)),
/// which alone sees timeouts and worker panics.
pub struct PredictionService {
    artifact: Arc<InferenceArtifact>,
    preprocessor: Preprocessor,
    postprocessor: Postprocessor,
}

impl std::fmt::Debug for PredictionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionService")
            .field("artifact", &self.artifact)
            .finish()
    }
}

impl PredictionService {
    pub fn new(artifact: Arc<InferenceArtifact>) -> Self {
        Self {
            preprocessor: Preprocessor::for_artifact(&artifact),
            postprocessor: Postprocessor::for_artifact(&artifact),
            artifact,
        }
    }

    pub fn artifact(&self) -> &Arc<InferenceArtifact> {
        &self.artifact
    }

    /// Predict the label of one image. CPU-bound and blocking.
    pub fn predict(
        &self,
        raw: RawImage,
        options: RequestOptions,
    ) -> Result<PredictionResult, PredictError> {
        let start = Instant::now();
        let bytes = raw.len();

        let result = self.run_stages(raw, options);

        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(prediction) => debug!(
                label = %prediction.label,
                score = prediction.score,
                latency_ms,
                bytes,
                "Prediction completed"
            ),
            Err(e) => {
                if e.is_client_error() {
                    debug!(kind = e.kind(), error = %e, latency_ms, "Prediction rejected");
                } else {
                    error!(kind = e.kind(), error = %e, latency_ms, "Prediction failed");
                }
            }
        }
        result
    }

    fn run_stages(
        &self,
        raw: RawImage,
        options: RequestOptions,
    ) -> Result<PredictionResult, PredictError> {
        let tensor = self.preprocessor.prepare(raw, options)?;
        let scores = self.artifact.infer(tensor)?;
        Ok(self.postprocessor.finalize(scores, options)?)
    }
}
