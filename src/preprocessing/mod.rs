//! Image preprocessing module
//!
//! Converts an uploaded image of unknown encoding into the fixed-shape tensor
//! the model expects:
//! 1. Decode (format sniffed from the bytes, declared content type as fallback)
//! 2. Bilinear resize to the model's `(H, W)`, or reject a mismatch
//! 3. Channel conversion (grayscale expansion, alpha drop)
//! 4. Normalization, always applied

mod pipeline;
mod tensor;

pub use pipeline::{decode, Preprocessor, RESIZE_FILTER};
pub use tensor::{InputTensor, RawImage};
