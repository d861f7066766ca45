//! Image preprocessing pipeline

use image::imageops::FilterType;
use image::io::Reader as ImageReader;
use image::{DynamicImage, GenericImageView, ImageError, ImageFormat};
use ndarray::Array3;
use std::io::Cursor;
use tracing::trace;

use super::tensor::{InputTensor, RawImage};
use crate::error::{DecodeError, PreprocessError, ShapeError};
use crate::model::{InferenceArtifact, InputShape, Normalization};
use crate::options::RequestOptions;

/// Interpolation used whenever an image is resized
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Turns uploaded images into tensors matching the model input
#[derive(Debug, Clone)]
pub struct Preprocessor {
    target: InputShape,
    normalization: Normalization,
}

impl Preprocessor {
    pub fn new(target: InputShape, normalization: Normalization) -> Self {
        Self { target, normalization }
    }

    /// Preprocessor configured from an artifact's declared input
    pub fn for_artifact(artifact: &InferenceArtifact) -> Self {
        Self::new(artifact.input_shape(), artifact.normalization().clone())
    }

    /// Decode, fit to `(H, W)`, convert channels, normalize.
    ///
    /// Normalization always runs; `with_resize` only controls whether a
    /// size mismatch is resized or rejected.
    pub fn prepare(
        &self,
        raw: RawImage,
        options: RequestOptions,
    ) -> Result<InputTensor, PreprocessError> {
        let decoded = decode(&raw)?;
        drop(raw);

        let fitted = self.fit_dimensions(decoded, options.with_resize)?;
        let pixels = self.convert_channels(&fitted)?;
        Ok(self.normalize(pixels)?)
    }

    fn fit_dimensions(&self, image: DynamicImage, with_resize: bool) -> Result<DynamicImage, ShapeError> {
        let (width, height) = image.dimensions();
        let target_width = self.target.width as u32;
        let target_height = self.target.height as u32;

        if (width, height) == (target_width, target_height) {
            return Ok(image);
        }
        if !with_resize {
            return Err(ShapeError::Dimensions {
                expected_width: target_width,
                expected_height: target_height,
                actual_width: width,
                actual_height: height,
            });
        }

        trace!(width, height, target_width, target_height, "Resizing image");
        Ok(image.resize_exact(target_width, target_height, RESIZE_FILTER))
    }

    fn convert_channels(&self, image: &DynamicImage) -> Result<Vec<u8>, ShapeError> {
        let expected = self.target.channels;
        let pixels = match expected {
            1 => image.to_luma8().into_raw(),
            3 => image.to_rgb8().into_raw(),
            4 => image.to_rgba8().into_raw(),
            _ => {
                return Err(ShapeError::Channels {
                    expected,
                    actual: image.color().channel_count() as usize,
                })
            }
        };

        if pixels.len() != self.target.len() {
            return Err(ShapeError::Channels {
                expected,
                actual: pixels.len() / (self.target.height * self.target.width).max(1),
            });
        }
        Ok(pixels)
    }

    fn normalize(&self, pixels: Vec<u8>) -> Result<InputTensor, ShapeError> {
        let channels = self.target.channels;
        let values: Vec<f32> = pixels
            .iter()
            .enumerate()
            .map(|(i, &p)| self.normalization.apply(i % channels, p))
            .collect();

        let data = Array3::from_shape_vec(self.target.as_tuple(), values).map_err(|_| {
            ShapeError::Channels {
                expected: channels,
                actual: pixels.len() / (self.target.height * self.target.width).max(1),
            }
        })?;
        Ok(InputTensor::new(data))
    }
}

/// Decode raw bytes, sniffing the format first and falling back to the
/// declared content type
pub fn decode(raw: &RawImage) -> Result<DynamicImage, DecodeError> {
    if raw.is_empty() {
        return Err(DecodeError::Empty);
    }

    let unsupported = || DecodeError::Unsupported {
        content_type: raw.content_type().map(str::to_string),
    };

    let mut reader = ImageReader::new(Cursor::new(raw.bytes()))
        .with_guessed_format()
        .map_err(|e| DecodeError::Corrupt(e.to_string()))?;

    if reader.format().is_none() {
        let declared = raw
            .content_type()
            .and_then(ImageFormat::from_mime_type)
            .ok_or_else(unsupported)?;
        reader.set_format(declared);
    }

    reader.decode().map_err(|e| match e {
        ImageError::Unsupported(_) => unsupported(),
        other => DecodeError::Corrupt(other.to_string()),
    })
}
