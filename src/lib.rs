//! Kolosal Vision - image classification prediction service
//!
//! Loads a frozen classification model once at startup and serves
//! predictions for uploaded images over HTTP:
//! - Decoding, optional resizing and normalization of the upload
//! - A forward pass through a shared, read-only model artifact
//! - Argmax selection with optional softmax calibration
//! - A bounded worker pool with a per-request deadline
//!
//! # Modules
//!
//! ## Prediction Pipeline
//! - [`model`] - Model artifact: manifest, vocabulary and backends (ONNX, linear)
//! - [`preprocessing`] - Raw upload to model input tensor
//! - [`calibration`] - Softmax calibration with temperature
//! - [`postprocessing`] - Score vector to label and score
//! - [`inference`] - Prediction service and worker pool
//!
//! ## Services
//! - [`server`] - HTTP server (`POST /predict/image`, health, metrics)
//! - [`cli`] - Command-line interface
//!
//! ## Support
//! - [`error`] - Per-stage error types
//! - [`options`] - Per-request flags
//! - [`monitoring`] - Latency and error statistics

// Core error handling
pub mod error;
pub mod options;

// Prediction pipeline
pub mod model;
pub mod preprocessing;
pub mod calibration;
pub mod postprocessing;
pub mod inference;

// Infrastructure
pub mod monitoring;

// Services
pub mod server;
pub mod cli;

pub use error::{DecodeError, InferenceError, LoadError, PredictError, ShapeError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{DecodeError, InferenceError, LoadError, PredictError, ShapeError};

    // Request flags
    pub use crate::options::RequestOptions;

    // Model
    pub use crate::model::{InferenceArtifact, ModelBackend, ModelManifest, ScoreVector};

    // Pipeline stages
    pub use crate::preprocessing::{InputTensor, Preprocessor, RawImage};
    pub use crate::calibration::{Calibrator, TemperatureScaling};
    pub use crate::postprocessing::{PredictionResult, Postprocessor};

    // Inference
    pub use crate::inference::{InferenceConfig, InferencePool, PredictionService};

    // Monitoring
    pub use crate::monitoring::PerformanceMetrics;

    // Server
    pub use crate::server::{create_router, run_server, AppState, ServerConfig};
}
