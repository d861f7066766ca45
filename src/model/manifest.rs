//! Artifact manifest parsing and validation

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::LoadError;

/// File name looked up when `load` is given a directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Largest accepted input height or width
const MAX_DIMENSION: usize = 16_384;

/// Serialized model format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// ONNX graph executed by tract
    Onnx,
    /// Dense linear classifier stored as JSON
    Linear,
}

/// Memory layout of the batched tensor handed to the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[1, H, W, C]`
    #[default]
    Nhwc,
    /// `[1, C, H, W]`
    Nchw,
}

impl TensorLayout {
    /// Batched runtime dimensions for an input shape
    pub fn batched_dims(&self, shape: InputShape) -> [usize; 4] {
        match self {
            TensorLayout::Nhwc => [1, shape.height, shape.width, shape.channels],
            TensorLayout::Nchw => [1, shape.channels, shape.height, shape.width],
        }
    }
}

/// Fixed model input shape `(H, W, C)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[usize; 3]", into = "[usize; 3]")]
pub struct InputShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl InputShape {
    pub fn new(height: usize, width: usize, channels: usize) -> Self {
        Self { height, width, channels }
    }

    /// Number of scalar values in one input
    pub fn len(&self) -> usize {
        self.height * self.width * self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_tuple(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.channels)
    }
}

impl From<[usize; 3]> for InputShape {
    fn from(dims: [usize; 3]) -> Self {
        Self::new(dims[0], dims[1], dims[2])
    }
}

impl From<InputShape> for [usize; 3] {
    fn from(shape: InputShape) -> Self {
        [shape.height, shape.width, shape.channels]
    }
}

impl std::fmt::Display for InputShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.height, self.width, self.channels)
    }
}

fn default_scale() -> f32 {
    1.0 / 255.0
}

fn default_temperature() -> f32 {
    1.0
}

/// Pixel normalization applied to every input: `((p * scale) - mean[c]) / std[c]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub mean: Vec<f32>,
    #[serde(default)]
    pub std: Vec<f32>,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            mean: Vec::new(),
            std: Vec::new(),
        }
    }
}

impl Normalization {
    /// Per-channel mean/std normalization on top of the 0-255 rescale
    pub fn with_mean_std(mean: Vec<f32>, std: Vec<f32>) -> Self {
        Self {
            mean,
            std,
            ..Self::default()
        }
    }

    /// Normalize one 8-bit sample of the given channel
    #[inline]
    pub fn apply(&self, channel: usize, value: u8) -> f32 {
        let scaled = value as f32 * self.scale;
        let mean = self.mean.get(channel).copied().unwrap_or(0.0);
        let std = self.std.get(channel).copied().unwrap_or(1.0);
        (scaled - mean) / std
    }

    fn validate(&self, channels: usize) -> Result<(), LoadError> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(LoadError::Invalid(format!(
                "normalization scale must be positive, got {}",
                self.scale
            )));
        }
        for (name, values) in [("mean", &self.mean), ("std", &self.std)] {
            if !values.is_empty() && values.len() != channels {
                return Err(LoadError::Invalid(format!(
                    "normalization {} has {} values for {} channels",
                    name,
                    values.len(),
                    channels
                )));
            }
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err(LoadError::Invalid("normalization mean must be finite".to_string()));
        }
        if self.std.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(LoadError::Invalid(
                "normalization std values must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Score calibration parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSpec {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for CalibrationSpec {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
        }
    }
}

/// Contents of `manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelManifest {
    pub format: ModelFormat,
    pub model_file: PathBuf,
    pub input_shape: InputShape,
    #[serde(default)]
    pub layout: TensorLayout,
    #[serde(default)]
    pub normalization: Normalization,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels_file: Option<PathBuf>,
    #[serde(default)]
    pub calibration: CalibrationSpec,
}

impl ModelManifest {
    /// Create a manifest with default layout, normalization and calibration
    pub fn new(format: ModelFormat, model_file: impl Into<PathBuf>, input_shape: InputShape) -> Self {
        Self {
            format,
            model_file: model_file.into(),
            input_shape,
            layout: TensorLayout::default(),
            normalization: Normalization::default(),
            labels: None,
            labels_file: None,
            calibration: CalibrationSpec::default(),
        }
    }

    /// Builder method to set an inline vocabulary
    pub fn with_labels<S: Into<String>>(mut self, labels: impl IntoIterator<Item = S>) -> Self {
        self.labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    /// Builder method to set the tensor layout
    pub fn with_layout(mut self, layout: TensorLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Builder method to set pixel normalization
    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    /// Builder method to set the softmax temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.calibration.temperature = temperature;
        self
    }

    /// Resolve `path` to a manifest file and parse it.
    ///
    /// Returns the manifest and the directory its relative paths resolve against.
    pub fn read(path: &Path) -> Result<(Self, PathBuf), LoadError> {
        let manifest_path = if path.is_dir() {
            path.join(MANIFEST_FILE)
        } else {
            path.to_path_buf()
        };

        let raw = std::fs::read_to_string(&manifest_path).map_err(|source| LoadError::Io {
            path: manifest_path.clone(),
            source,
        })?;
        let manifest: ModelManifest =
            serde_json::from_str(&raw).map_err(|e| LoadError::Manifest {
                path: manifest_path.clone(),
                reason: e.to_string(),
            })?;

        let base_dir = manifest_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok((manifest, base_dir))
    }

    /// Check the declared shape, normalization and calibration for consistency
    pub fn validate(&self) -> Result<(), LoadError> {
        let shape = self.input_shape;
        if shape.height == 0 || shape.width == 0 || shape.channels == 0 {
            return Err(LoadError::Invalid(format!(
                "input_shape {} has a zero dimension",
                shape
            )));
        }
        if shape.height > MAX_DIMENSION || shape.width > MAX_DIMENSION {
            return Err(LoadError::Invalid(format!(
                "input_shape {} exceeds the {} pixel limit",
                shape, MAX_DIMENSION
            )));
        }
        if !matches!(shape.channels, 1 | 3 | 4) {
            return Err(LoadError::Invalid(format!(
                "input_shape declares {} channels; supported are 1, 3 or 4",
                shape.channels
            )));
        }

        self.normalization.validate(shape.channels)?;

        let temperature = self.calibration.temperature;
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(LoadError::Invalid(format!(
                "calibration temperature must be positive, got {}",
                temperature
            )));
        }
        Ok(())
    }

    /// Load the vocabulary from the inline list or the labels file
    pub fn resolve_labels(&self, base_dir: &Path) -> Result<Vec<String>, LoadError> {
        let labels = match (&self.labels, &self.labels_file) {
            (Some(_), Some(_)) => {
                return Err(LoadError::Invalid(
                    "manifest sets both labels and labels_file".to_string(),
                ))
            }
            (None, None) => {
                return Err(LoadError::Invalid(
                    "manifest needs either labels or labels_file".to_string(),
                ))
            }
            (Some(labels), None) => labels.clone(),
            (None, Some(file)) => {
                let path = base_dir.join(file);
                let raw = std::fs::read_to_string(&path)
                    .map_err(|source| LoadError::Io { path, source })?;
                raw.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect()
            }
        };

        if labels.is_empty() {
            return Err(LoadError::Invalid("vocabulary is empty".to_string()));
        }
        if let Some(idx) = labels.iter().position(|l| l.trim().is_empty()) {
            return Err(LoadError::Invalid(format!("label at index {} is blank", idx)));
        }
        Ok(labels)
    }
}
