//! WebAssembly exports for ImageStag Warp effects.
//!
//! These functions are exposed to JavaScript via wasm-bindgen.
//!
//! ## Buffer Layout
//!
//! Every function takes a flat row-major `f32` buffer of length
//! `width * height * channels` (channels 1 or 3, values 0.0-1.0) and returns
//! a new buffer in the same layout. Waves is the only effect whose output is
//! larger than its input; use [`waves_output_size_wasm`] to size the canvas.

use ndarray::Array3;
use wasm_bindgen::prelude::*;

use crate::effects::{
    apply_to_image, CylinderParams, Effect, Falloff, FishEyeParams, GaussianParams, MeanParams, MedianParams,
    RadialBlurParams, SquareEyeParams, SwirlParams, WavesParams,
};
use crate::filters::distort::waves_shape;
use crate::image::Image;

fn falloff(gaussian: bool) -> Falloff {
    if gaussian {
        Falloff::Gaussian
    } else {
        Falloff::Linear
    }
}

fn run(data: &[f32], width: usize, height: usize, channels: usize, effect: Effect) -> Result<Vec<f32>, JsValue> {
    let input = Array3::from_shape_vec((height, width, channels), data.to_vec())
        .map_err(|e| JsValue::from_str(&format!("invalid dimensions: {e}")))?;
    let image = Image::new(input).map_err(|e| JsValue::from_str(&e.to_string()))?;

    let result = apply_to_image(&effect, &image).map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(result.into_array().into_raw_vec_and_offset().0)
}

// ============================================================================
// Distortions
// ============================================================================

/// Fisheye lens centered at (center_x, center_y).
///
/// # Arguments
/// * `data` - Flat array of floats (length = width * height * channels), values 0.0-1.0
/// * `sigma` - Lens radius in pixels
/// * `gaussian_falloff` - Gaussian weight instead of the linear default
#[wasm_bindgen]
pub fn fisheye_wasm(
    data: &[f32],
    width: usize,
    height: usize,
    channels: usize,
    center_x: f32,
    center_y: f32,
    sigma: f32,
    gaussian_falloff: bool,
) -> Result<Vec<f32>, JsValue> {
    let params = FishEyeParams {
        center_x,
        center_y,
        sigma,
        falloff: falloff(gaussian_falloff),
    };
    run(data, width, height, channels, Effect::FishEye(params))
}

/// Fisheye with an Lp distance; Gaussian weight unless `linear_falloff`.
#[wasm_bindgen]
pub fn square_eye_wasm(
    data: &[f32],
    width: usize,
    height: usize,
    channels: usize,
    center_x: f32,
    center_y: f32,
    sigma: f32,
    p: f32,
    linear_falloff: bool,
) -> Result<Vec<f32>, JsValue> {
    let params = SquareEyeParams {
        center_x,
        center_y,
        sigma,
        p,
        falloff: falloff(!linear_falloff),
    };
    run(data, width, height, channels, Effect::SquareEye(params))
}

#[wasm_bindgen]
pub fn swirl_wasm(
    data: &[f32],
    width: usize,
    height: usize,
    channels: usize,
    center_x: f32,
    center_y: f32,
    sigma: f32,
    magnitude: f32,
) -> Result<Vec<f32>, JsValue> {
    let params = SwirlParams {
        center_x,
        center_y,
        sigma,
        magnitude,
    };
    run(data, width, height, channels, Effect::Swirl(params))
}

/// Sine waves; the result has the size given by [`waves_output_size_wasm`].
#[wasm_bindgen]
pub fn waves_wasm(
    data: &[f32],
    width: usize,
    height: usize,
    channels: usize,
    amplitude_x: f32,
    amplitude_y: f32,
    frequency: f32,
    phase_x: f32,
    phase_y: f32,
) -> Result<Vec<f32>, JsValue> {
    let params = WavesParams {
        amplitude_x,
        amplitude_y,
        frequency,
        phase_x,
        phase_y,
    };
    run(data, width, height, channels, Effect::Waves(params))
}

/// Output `[width, height]` of [`waves_wasm`] for the given input size.
#[wasm_bindgen]
pub fn waves_output_size_wasm(width: usize, height: usize, amplitude_x: f32, amplitude_y: f32) -> Vec<u32> {
    let params = WavesParams {
        amplitude_x,
        amplitude_y,
        ..WavesParams::default()
    };
    let (out_height, out_width) = waves_shape(height, width, &params);
    vec![out_width as u32, out_height as u32]
}

/// Cylinder anamorphosis rotated by `angle_shift` degrees.
#[wasm_bindgen]
pub fn cylinder_wasm(
    data: &[f32],
    width: usize,
    height: usize,
    channels: usize,
    angle_shift: f32,
) -> Result<Vec<f32>, JsValue> {
    run(data, width, height, channels, Effect::Cylinder(CylinderParams { angle_shift }))
}

// ============================================================================
// Blur & Noise Filters
// ============================================================================

#[wasm_bindgen]
pub fn radial_blur_wasm(
    data: &[f32],
    width: usize,
    height: usize,
    channels: usize,
    sigma: f32,
) -> Result<Vec<f32>, JsValue> {
    run(data, width, height, channels, Effect::RadialBlur(RadialBlurParams { sigma }))
}

#[wasm_bindgen]
pub fn gaussian_wasm(
    data: &[f32],
    width: usize,
    height: usize,
    channels: usize,
    radius: f32,
) -> Result<Vec<f32>, JsValue> {
    run(data, width, height, channels, Effect::Gaussian(GaussianParams { radius }))
}

#[wasm_bindgen]
pub fn mean_wasm(data: &[f32], width: usize, height: usize, channels: usize, size: f32) -> Result<Vec<f32>, JsValue> {
    run(data, width, height, channels, Effect::Mean(MeanParams { size }))
}

#[wasm_bindgen]
pub fn median_wasm(
    data: &[f32],
    width: usize,
    height: usize,
    channels: usize,
    size: f32,
) -> Result<Vec<f32>, JsValue> {
    run(data, width, height, channels, Effect::Median(MedianParams { size }))
}
