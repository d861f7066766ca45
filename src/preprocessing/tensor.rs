//! Request-scoped image and tensor values

use ndarray::{Array3, ArrayView3};

use crate::model::{InputShape, TensorLayout};

/// Uploaded image bytes plus the content type the client declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    bytes: Vec<u8>,
    content_type: Option<String>,
}

impl RawImage {
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Normalized model input of shape `(H, W, C)`
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Array3<f32>,
}

impl InputTensor {
    pub fn new(data: Array3<f32>) -> Self {
        Self { data }
    }

    /// All-zero tensor, used to warm up a freshly loaded model
    pub fn zeros(shape: InputShape) -> Self {
        Self::new(Array3::zeros(shape.as_tuple()))
    }

    pub fn shape(&self) -> InputShape {
        let (h, w, c) = self.data.dim();
        InputShape::new(h, w, c)
    }

    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// Flatten in the order a runtime with the given layout expects
    pub fn to_layout_vec(&self, layout: TensorLayout) -> Vec<f32> {
        match layout {
            TensorLayout::Nhwc => self.data.iter().copied().collect(),
            TensorLayout::Nchw => self.data.view().permuted_axes([2, 0, 1]).iter().copied().collect(),
        }
    }
}
