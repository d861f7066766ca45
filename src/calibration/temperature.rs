//! Temperature-scaled softmax calibration

use serde::{Deserialize, Serialize};

use crate::calibration::Calibrator;

/// Softmax over logits divided by a temperature `T`:
/// `p_i = exp(s_i / T) / Σ_j exp(s_j / T)`
///
/// `T > 1` softens the distribution, `T < 1` sharpens it, `T = 1` is plain
/// softmax. The ranking of the scores is unchanged for any positive `T`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureScaling {
    temperature: f32,
}

impl TemperatureScaling {
    /// Temperature must be positive and finite; artifact validation
    /// guarantees this for values read from a manifest.
    pub fn new(temperature: f32) -> Self {
        Self { temperature }
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

impl Default for TemperatureScaling {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Calibrator for TemperatureScaling {
    fn calibrate(&self, scores: &[f32]) -> Vec<f32> {
        softmax(scores, self.temperature)
    }
}

/// Numerically stable softmax: the raw maximum is subtracted before the
/// division by `temperature`, so every exponent is `<= 0` and the top class
/// always contributes `exp(0) = 1` to the sum. Accumulation is in f64.
pub fn softmax(scores: &[f32], temperature: f32) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }

    let temperature = f64::from(temperature);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
    let exps: Vec<f64> = scores
        .iter()
        .map(|&s| ((f64::from(s) - max) / temperature).exp())
        .collect();
    let sum: f64 = exps.iter().sum();

    exps.into_iter()
        .map(|e| ((e / sum) as f32).clamp(0.0, 1.0))
        .collect()
}
