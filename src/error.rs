//! Error types for the Kolosal Vision prediction pipeline
//!
//! Each pipeline stage has its own error enum so a stage's contract states
//! exactly which failures it can produce:
//!
//! - [`LoadError`] - startup only, fatal
//! - [`DecodeError`] / [`ShapeError`] - client faults raised by the preprocessor
//! - [`InferenceError`] - runtime faults raised by the model handle
//! - [`PredictError`] - what the prediction service hands to the endpoint layer

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure to load or validate a model artifact at startup
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    #[error("Invalid model file {path}: {reason}")]
    Model { path: PathBuf, reason: String },

    #[error("Invalid artifact: {0}")]
    Invalid(String),

    #[error("Vocabulary has {labels} labels but the model produces {outputs} scores")]
    VocabularyMismatch { labels: usize, outputs: usize },
}

/// The uploaded bytes could not be decoded into a pixel grid
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Image payload is empty")]
    Empty,

    #[error("Unsupported image encoding{}", .content_type.as_deref().map(|c| format!(" (declared {})", c)).unwrap_or_default())]
    Unsupported { content_type: Option<String> },

    #[error("Corrupt image data: {0}")]
    Corrupt(String),
}

/// Image geometry that cannot be reconciled with the model input
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("Image is {actual_width}x{actual_height} but the model expects {expected_width}x{expected_height}; enable resizing or upload a matching image")]
    Dimensions {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("Model expects {expected} channels, image provides {actual}")]
    Channels { expected: usize, actual: usize },
}

/// Errors raised while turning a raw upload into a model tensor
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreprocessError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Runtime failure of the model computation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Model runtime fault: {0}")]
    Runtime(String),

    #[error("Model produced a non-finite score at index {index}")]
    NonFinite { index: usize },

    #[error("Model artifact is in an invalid state: {0}")]
    InvalidArtifact(String),
}

/// Every way a single prediction can fail, as seen by the endpoint layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictError {
    #[error("{0}")]
    Decode(DecodeError),

    #[error("{0}")]
    Shape(ShapeError),

    #[error("{0}")]
    Inference(#[from] InferenceError),

    #[error("Prediction exceeded the {}ms deadline", .0.as_millis())]
    Timeout(Duration),
}

impl PredictError {
    /// Machine-readable error kind used in response bodies and logs
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::Decode(_) => "decode_error",
            PredictError::Shape(_) => "shape_error",
            PredictError::Inference(_) => "inference_error",
            PredictError::Timeout(_) => "timeout",
        }
    }

    /// Whether the caller can fix the failure by changing the request
    pub fn is_client_error(&self) -> bool {
        matches!(self, PredictError::Decode(_) | PredictError::Shape(_))
    }
}

impl From<PreprocessError> for PredictError {
    fn from(err: PreprocessError) -> Self {
        match err {
            PreprocessError::Decode(e) => PredictError::Decode(e),
            PreprocessError::Shape(e) => PredictError::Shape(e),
        }
    }
}

impl From<DecodeError> for PredictError {
    fn from(err: DecodeError) -> Self {
        PredictError::Decode(err)
    }
}

impl From<ShapeError> for PredictError {
    fn from(err: ShapeError) -> Self {
        PredictError::Shape(err)
    }
}
