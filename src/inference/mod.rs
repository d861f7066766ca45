//! Inference module
//!
//! Provides the prediction path used by the HTTP layer and the CLI:
//! - [`PredictionService`] chains preprocessing, the model and
//!   postprocessing for a single image
//! - [`InferencePool`] bounds how many predictions compute at once and
//!   enforces the per-request deadline

mod config;
mod pool;
mod service;

pub use config::InferenceConfig;
pub use pool::InferencePool;
pub use service::PredictionService;
