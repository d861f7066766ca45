//! Model handle
//!
//! Owns the frozen inference artifact loaded at startup:
//! - Manifest with the fixed `(H, W, C)` input shape and pixel normalization
//! - Ordered label vocabulary aligned with the model's output vector
//! - A read-only runtime backend (tract ONNX plan or linear classifier)
//!
//! The artifact is validated once when loaded, then shared behind an `Arc`
//! and never mutated.

mod backend;
mod manifest;

pub use backend::{LinearBackend, ModelBackend, OnnxBackend};
pub use manifest::{
    CalibrationSpec, InputShape, ModelFormat, ModelManifest, Normalization, TensorLayout,
    MANIFEST_FILE,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{InferenceError, LoadError};
use crate::preprocessing::InputTensor;

/// Raw per-class model output, aligned by index with the vocabulary
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreVector(Vec<f32>);

impl ScoreVector {
    pub fn new(scores: Vec<f32>) -> Self {
        Self(scores)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of the highest score. Exact ties resolve to the lowest index;
    /// NaN entries never win.
    pub fn argmax(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (idx, &score) in self.0.iter().enumerate() {
            if score.is_nan() {
                continue;
            }
            match best {
                Some(b) if score <= self.0[b] => {}
                _ => best = Some(idx),
            }
        }
        best
    }
}

impl From<Vec<f32>> for ScoreVector {
    fn from(scores: Vec<f32>) -> Self {
        Self::new(scores)
    }
}

/// Serializable description of a loaded artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub backend: String,
    pub input_shape: InputShape,
    pub layout: TensorLayout,
    pub num_labels: usize,
    pub labels: Vec<String>,
    pub temperature: f32,
    pub source: Option<PathBuf>,
}

/// The loaded, validated model
pub struct InferenceArtifact {
    manifest: ModelManifest,
    labels: Vec<String>,
    backend: Box<dyn ModelBackend>,
    source: Option<PathBuf>,
}

impl std::fmt::Debug for InferenceArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceArtifact")
            .field("backend", &self.backend.name())
            .field("input_shape", &self.manifest.input_shape)
            .field("num_labels", &self.labels.len())
            .field("source", &self.source)
            .finish()
    }
}

impl InferenceArtifact {
    /// Load an artifact from a directory holding `manifest.json` or from a
    /// manifest file path
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let (manifest, base_dir) = ModelManifest::read(path)?;
        manifest.validate()?;

        let labels = manifest.resolve_labels(&base_dir)?;
        let model_path = base_dir.join(&manifest.model_file);
        let backend: Box<dyn ModelBackend> = match manifest.format {
            ModelFormat::Onnx => Box::new(OnnxBackend::load(
                &model_path,
                manifest.input_shape,
                manifest.layout,
            )?),
            ModelFormat::Linear => Box::new(LinearBackend::load(
                &model_path,
                manifest.input_shape,
                manifest.layout,
            )?),
        };

        let mut artifact = Self::from_parts(manifest, labels, backend)?;
        artifact.source = Some(path.to_path_buf());

        info!(
            path = %path.display(),
            backend = artifact.backend.name(),
            input_shape = %artifact.input_shape(),
            labels = artifact.labels.len(),
            "Model artifact loaded"
        );
        Ok(artifact)
    }

    /// Assemble an artifact from an already constructed backend.
    ///
    /// Runs the same validation as [`InferenceArtifact::load`], including a
    /// warm-up pass that checks the output length against the vocabulary.
    pub fn from_parts(
        manifest: ModelManifest,
        labels: Vec<String>,
        backend: Box<dyn ModelBackend>,
    ) -> Result<Self, LoadError> {
        manifest.validate()?;
        if labels.is_empty() {
            return Err(LoadError::Invalid("vocabulary is empty".to_string()));
        }

        let artifact = Self {
            manifest,
            labels,
            backend,
            source: None,
        };
        artifact.warmup()?;
        Ok(artifact)
    }

    fn warmup(&self) -> Result<(), LoadError> {
        let scores = self
            .backend
            .run(&InputTensor::zeros(self.input_shape()))
            .map_err(|e| LoadError::Invalid(format!("warm-up inference failed: {}", e)))?;

        if scores.len() != self.labels.len() {
            return Err(LoadError::VocabularyMismatch {
                labels: self.labels.len(),
                outputs: scores.len(),
            });
        }
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(LoadError::Invalid(
                "warm-up inference produced non-finite scores".to_string(),
            ));
        }
        Ok(())
    }

    /// Run one forward pass.
    ///
    /// Safe to call from many threads at once: the backend is read-only and
    /// each call owns its execution state.
    pub fn infer(&self, tensor: InputTensor) -> Result<ScoreVector, InferenceError> {
        let expected = self.input_shape();
        let actual = tensor.shape();
        if actual != expected {
            return Err(InferenceError::ShapeMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }

        let scores = self.backend.run(&tensor)?;
        if scores.len() != self.labels.len() {
            return Err(InferenceError::InvalidArtifact(format!(
                "model produced {} scores for {} labels",
                scores.len(),
                self.labels.len()
            )));
        }
        if let Some(index) = scores.iter().position(|s| !s.is_finite()) {
            return Err(InferenceError::NonFinite { index });
        }

        Ok(ScoreVector::new(scores))
    }

    pub fn manifest(&self) -> &ModelManifest {
        &self.manifest
    }

    pub fn input_shape(&self) -> InputShape {
        self.manifest.input_shape
    }

    pub fn normalization(&self) -> &Normalization {
        &self.manifest.normalization
    }

    pub fn temperature(&self) -> f32 {
        self.manifest.calibration.temperature
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn describe(&self) -> ArtifactSummary {
        ArtifactSummary {
            backend: self.backend.name().to_string(),
            input_shape: self.input_shape(),
            layout: self.manifest.layout,
            num_labels: self.labels.len(),
            labels: self.labels.clone(),
            temperature: self.temperature(),
            source: self.source.clone(),
        }
    }
}
