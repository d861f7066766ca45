//! Postprocessing module
//!
//! Turns a raw score vector into the label and confidence returned to the
//! caller.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::calibration::{Calibrator, TemperatureScaling};
use crate::error::InferenceError;
use crate::model::{InferenceArtifact, ScoreVector};
use crate::options::RequestOptions;

/// Final answer for one image.
///
/// `score` is a probability in `[0, 1]` when the request asked for
/// calibration; otherwise it is the model's raw score (a logit) and carries
/// no bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(rename = "Label")]
    pub label: String,
    #[serde(rename = "Score")]
    pub score: f32,
}

/// Selects the winning class and reports its score
#[derive(Debug, Clone)]
pub struct Postprocessor {
    labels: Vec<String>,
    calibrator: TemperatureScaling,
}

impl Postprocessor {
    pub fn new(labels: Vec<String>, calibrator: TemperatureScaling) -> Self {
        Self { labels, calibrator }
    }

    /// Postprocessor using an artifact's vocabulary and temperature
    pub fn for_artifact(artifact: &InferenceArtifact) -> Self {
        Self::new(
            artifact.labels().to_vec(),
            TemperatureScaling::new(artifact.temperature()),
        )
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Pick the top class and its (optionally calibrated) score.
    ///
    /// The winner is chosen on the raw scores with ties going to the lowest
    /// index. Calibration is monotonic, so enabling it changes only the
    /// reported score, never the label.
    pub fn finalize(
        &self,
        scores: ScoreVector,
        options: RequestOptions,
    ) -> Result<PredictionResult, InferenceError> {
        let index = scores.argmax().ok_or_else(|| {
            error!(len = scores.len(), "Score vector has no selectable entry");
            InferenceError::InvalidArtifact("model returned no usable scores".to_string())
        })?;

        let label = self.labels.get(index).ok_or_else(|| {
            error!(
                index,
                vocabulary = self.labels.len(),
                "Winning index outside the label vocabulary"
            );
            InferenceError::InvalidArtifact(format!(
                "class index {} is outside a vocabulary of {}",
                index,
                self.labels.len()
            ))
        })?;

        let raw = scores.as_slice();
        let score = if options.with_post_process {
            self.calibrator.calibrate(raw)[index]
        } else {
            raw[index]
        };

        if !score.is_finite() {
            error!(
                index,
                with_post_process = options.with_post_process,
                temperature = self.calibrator.temperature(),
                "Winning score is not a finite number"
            );
            return Err(InferenceError::NonFinite { index });
        }

        Ok(PredictionResult {
            label: label.clone(),
            score,
        })
    }
}
