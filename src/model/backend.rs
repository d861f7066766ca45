//! Inference runtimes behind the model handle

use ndarray::{Array1, Array2};
use serde::Deserialize;
use std::path::Path;
use tract_onnx::prelude::*;

use super::manifest::{InputShape, TensorLayout};
use crate::error::{InferenceError, LoadError};
use crate::preprocessing::InputTensor;

/// A loaded model computation.
///
/// Implementations hold only read-only state. Any scratch space a run needs
/// is created inside `run`, so one backend can serve concurrent callers.
pub trait ModelBackend: Send + Sync {
    /// Short runtime name for logs and artifact summaries
    fn name(&self) -> &'static str;

    /// Compute one score per class for a single input
    fn run(&self, tensor: &InputTensor) -> Result<Vec<f32>, InferenceError>;
}

/// ONNX graph optimized into a tract execution plan.
///
/// `SimplePlan::run` builds a fresh `SimpleState` for every call, which keeps
/// intermediate values request-scoped while the plan itself is shared.
pub struct OnnxBackend {
    plan: TypedRunnableModel<TypedModel>,
    shape: InputShape,
    layout: TensorLayout,
}

impl std::fmt::Debug for OnnxBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxBackend")
            .field("shape", &self.shape)
            .field("layout", &self.layout)
            .finish()
    }
}

impl OnnxBackend {
    /// Parse, type-check and optimize an ONNX file for a fixed input shape
    pub fn load(path: &Path, shape: InputShape, layout: TensorLayout) -> Result<Self, LoadError> {
        let [n, d1, d2, d3] = layout.batched_dims(shape);
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| {
                model.with_input_fact(
                    0,
                    InferenceFact::dt_shape(f32::datum_type(), tvec!(n, d1, d2, d3)),
                )
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| LoadError::Model {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(Self { plan, shape, layout })
    }
}

impl ModelBackend for OnnxBackend {
    fn name(&self) -> &'static str {
        "onnx"
    }

    fn run(&self, tensor: &InputTensor) -> Result<Vec<f32>, InferenceError> {
        let dims = self.layout.batched_dims(self.shape);
        let values = tensor.to_layout_vec(self.layout);
        let input = Tensor::from_shape::<f32>(&dims, &values)
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;

        let output = outputs
            .first()
            .ok_or_else(|| InferenceError::Runtime("model produced no outputs".to_string()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;

        Ok(view.iter().copied().collect())
    }
}

#[derive(Deserialize)]
struct LinearWeights {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

/// Dense linear classifier: `scores = W · x + b` over the flattened input
#[derive(Debug, Clone)]
pub struct LinearBackend {
    weights: Array2<f32>,
    bias: Array1<f32>,
    layout: TensorLayout,
}

impl LinearBackend {
    /// Build from a `(classes, H*W*C)` weight matrix and per-class bias
    pub fn new(
        weights: Array2<f32>,
        bias: Array1<f32>,
        shape: InputShape,
        layout: TensorLayout,
    ) -> Result<Self, LoadError> {
        if weights.nrows() != bias.len() {
            return Err(LoadError::Invalid(format!(
                "linear model has {} weight rows but {} bias values",
                weights.nrows(),
                bias.len()
            )));
        }
        if weights.ncols() != shape.len() {
            return Err(LoadError::Invalid(format!(
                "linear model expects {} inputs but input_shape {} has {}",
                weights.ncols(),
                shape,
                shape.len()
            )));
        }
        Ok(Self { weights, bias, layout })
    }

    /// Load `{"weights": [[..]], "bias": [..]}` from a JSON file
    pub fn load(path: &Path, shape: InputShape, layout: TensorLayout) -> Result<Self, LoadError> {
        let raw = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: LinearWeights = serde_json::from_str(&raw).map_err(|e| LoadError::Model {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let rows = parsed.weights.len();
        let cols = shape.len();
        if let Some(idx) = parsed.weights.iter().position(|row| row.len() != cols) {
            return Err(LoadError::Model {
                path: path.to_path_buf(),
                reason: format!(
                    "weight row {} has {} values, expected {}",
                    idx,
                    parsed.weights[idx].len(),
                    cols
                ),
            });
        }

        let flat: Vec<f32> = parsed.weights.into_iter().flatten().collect();
        let weights = Array2::from_shape_vec((rows, cols), flat).map_err(|e| LoadError::Model {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::new(weights, Array1::from(parsed.bias), shape, layout)
    }
}

impl ModelBackend for LinearBackend {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn run(&self, tensor: &InputTensor) -> Result<Vec<f32>, InferenceError> {
        let x = Array1::from(tensor.to_layout_vec(self.layout));
        if x.len() != self.weights.ncols() {
            return Err(InferenceError::ShapeMismatch {
                expected: self.weights.ncols().to_string(),
                actual: x.len().to_string(),
            });
        }
        let scores = self.weights.dot(&x) + &self.bias;
        Ok(scores.to_vec())
    }
}
