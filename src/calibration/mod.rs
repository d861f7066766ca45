//! Score calibration module
//!
//! Maps raw model scores (logits) onto a probability distribution. Every
//! calibrator here is monotonic, so it never changes which class ranks first.

mod temperature;

pub use temperature::{softmax, TemperatureScaling};

/// Trait for score calibrators
pub trait Calibrator: Send + Sync {
    /// Calibrate a full score vector into values in `[0, 1]`
    fn calibrate(&self, scores: &[f32]) -> Vec<f32>;
}
