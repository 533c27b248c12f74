//! Image buffer handed between the editor, the worker and the effects.
//!
//! ## Layout
//!
//! | Format | Shape | Type | Description |
//! |--------|-------|------|-------------|
//! | Grayscale | (H, W, 1) | f32 | Single luminance channel, 0.0-1.0 |
//! | RGB | (H, W, 3) | f32 | Red, green, blue, 0.0-1.0 |
//!
//! Decoders usually hand out 8-bit data, so [`Image::from_u8`] and
//! [`Image::to_u8`] convert at the codec boundary.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

use crate::error::{Result, TransformError};
use crate::filters::core::clamp_unit;

/// Validated H×W×C float image with every sample in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    data: Array3<f32>,
}

impl Image {
    /// Wrap an `(height, width, channels)` array.
    ///
    /// Fails for empty images and channel counts other than 1 or 3.
    /// Samples are clamped into `[0, 1]`, NaN becomes 0, and the data is
    /// stored row-major.
    pub fn new(mut data: Array3<f32>) -> Result<Self> {
        let (height, width, channels) = data.dim();
        if height == 0 || width == 0 {
            return Err(TransformError::InvalidImage(format!(
                "empty image ({height}x{width})"
            )));
        }
        if channels != 1 && channels != 3 {
            return Err(TransformError::InvalidImage(format!(
                "expected 1 or 3 channels, got {channels}"
            )));
        }
        if !data.is_standard_layout() {
            data = data.as_standard_layout().into_owned();
        }
        data.mapv_inplace(clamp_unit);
        Ok(Image { data })
    }

    /// Single-channel image from a 2-D plane.
    pub fn from_gray(plane: Array2<f32>) -> Result<Self> {
        Image::new(plane.insert_axis(Axis(2)))
    }

    /// Convert 8-bit samples (0-255) to a float image (0.0-1.0).
    pub fn from_u8(input: ArrayView3<u8>) -> Result<Self> {
        Image::new(input.mapv(|v| v as f32 / 255.0))
    }

    /// Convert back to 8-bit samples for encoders and display.
    pub fn to_u8(&self) -> Array3<u8> {
        self.data.mapv(|v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    /// `(height, width, channels)`
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// Borrow one channel plane.
    ///
    /// Panics if `index` is out of range, like ndarray indexing.
    pub fn channel(&self, index: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(2), index)
    }

    pub fn into_array(self) -> Array3<f32> {
        self.data
    }
}
