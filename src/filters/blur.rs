//! Blur filters: Mean, Gaussian, Radial.
//!
//! All filters take one channel plane with values 0.0-1.0. Mean and
//! Gaussian return the input untouched for a non-positive size/radius.

use std::f32::consts::PI;

use ndarray::{Array2, ArrayView2};

use super::core::{
    clamp_unit, flip_horizontal, flip_vertical, gaussian_blur_plane, gaussian_blur_rows_wrap, remap, Interpolation,
};
use crate::effects::{GaussianParams, MeanParams, RadialBlurParams};

// ============================================================================
// Mean Filter
// ============================================================================

/// Running box sum along each row, zero padded, divided by `size`.
///
/// The window covers `x - size/2 ..= x + ceil(size/2) - 1`, so even sizes
/// lean one tap to the left.
fn box_filter_rows(plane: ArrayView2<f32>, size: usize) -> Array2<f32> {
    let (height, width) = plane.dim();
    let before = size / 2;
    let after = size - before - 1;

    let mut output = Array2::<f32>::zeros((height, width));
    let mut prefix = vec![0.0f64; width + 1];

    for y in 0..height {
        for x in 0..width {
            prefix[x + 1] = prefix[x] + plane[[y, x]] as f64;
        }
        for x in 0..width {
            let lo = x.saturating_sub(before);
            let hi = (x + after + 1).min(width);
            output[[y, x]] = ((prefix[hi] - prefix[lo]) / size as f64) as f32;
        }
    }

    output
}

/// Separable mean filter in O(width * height).
///
/// Rows are filtered first, then the transposed result is filtered again.
///
/// # Arguments
/// * `plane` - Channel values (height, width)
/// * `params` - Box width; truncated to an integer, `<= 0` is a passthrough
///
/// # Returns
/// Filtered plane with the same dimensions
pub fn mean_filter(plane: ArrayView2<f32>, params: &MeanParams) -> Array2<f32> {
    if !(params.size > 0.0) {
        return plane.to_owned();
    }
    let size = (params.size.floor() as usize).max(1);

    let rows = box_filter_rows(plane, size);
    let columns = box_filter_rows(rows.t(), size);
    columns.reversed_axes().mapv(clamp_unit)
}

// ============================================================================
// Gaussian Filter
// ============================================================================

/// Gaussian blur with standard deviation `radius`.
///
/// Runs on the raw channel values, so each color plane is filtered
/// independently.
pub fn gaussian_filter(plane: ArrayView2<f32>, params: &GaussianParams) -> Array2<f32> {
    if !(params.radius > 0.0) {
        return plane.to_owned();
    }
    gaussian_blur_plane(plane, params.radius)
}

// ============================================================================
// Radial Blur
// ============================================================================

#[inline]
fn linspace_at(end: f32, count: usize, index: usize) -> f32 {
    if count <= 1 {
        0.0
    } else {
        end * index as f32 / (count - 1) as f32
    }
}

/// Rotational blur around the image center.
///
/// The plane is resampled into polar form (rows = angle over 0..2pi,
/// columns = radius over 0..r_max), blurred along the angle axis with
/// wrap-around, and resampled back. The flips applied on the way in are
/// undone on the way out.
///
/// # Arguments
/// * `plane` - Channel values (height, width)
/// * `params` - Angular blur strength `sigma` in polar rows; `<= 0` is a passthrough
/// * `interpolation` - Sampling kernel for both polar resamplings
pub fn radial_blur(plane: ArrayView2<f32>, params: &RadialBlurParams, interpolation: Interpolation) -> Array2<f32> {
    if !(params.sigma > 0.0) {
        return plane.mapv(clamp_unit);
    }

    let (height, width) = plane.dim();
    let flipped = flip_vertical(plane);

    let r_max = ((height as f32 / 2.0).powi(2) + (width as f32 / 2.0).powi(2)).sqrt();
    let p_max = 2.0 * PI;
    let cy = (height / 2) as f32;
    let cx = (width / 2) as f32;

    // Cartesian -> polar
    let polar = remap(flipped.view(), (height, width), interpolation, |i, j| {
        let phi = linspace_at(p_max, height, i);
        let r = linspace_at(r_max, width, j);
        (r * phi.sin() + cy, r * phi.cos() + cx)
    });
    let polar = flip_vertical(polar.view());

    let blurred = gaussian_blur_rows_wrap(polar.view(), params.sigma);

    // Polar -> cartesian
    let rows = height.saturating_sub(1) as f32;
    let cols = width.saturating_sub(1) as f32;
    let back = remap(blurred.view(), (height, width), interpolation, |y, x| {
        let dy = y as f32 - cy;
        let dx = x as f32 - cx;
        let phi = dy.atan2(dx) + PI;
        let r = dy.hypot(dx);
        (phi / p_max * rows, r / r_max * cols)
    });

    flip_horizontal(flip_vertical(back.view()).view())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn checker(height: usize, width: usize) -> Array2<f32> {
        Array2::from_shape_fn((height, width), |(y, x)| ((y + x) % 2) as f32)
    }

    /// Direct zero-padded box convolution, used as the reference.
    fn box_reference(plane: &Array2<f32>, size: usize) -> Array2<f32> {
        let (height, width) = plane.dim();
        let before = (size / 2) as isize;
        let after = (size - size / 2 - 1) as isize;
        Array2::from_shape_fn((height, width), |(y, x)| {
            let mut sum = 0.0f64;
            for dy in -before..=after {
                for dx in -before..=after {
                    let sy = y as isize + dy;
                    let sx = x as isize + dx;
                    if sy >= 0 && sy < height as isize && sx >= 0 && sx < width as isize {
                        sum += plane[[sy as usize, sx as usize]] as f64;
                    }
                }
            }
            (sum / (size * size) as f64) as f32
        })
    }

    #[test]
    fn test_mean_row_matches_direct_convolution() {
        let plane = array![[0.0f32, 1.0, 0.0, 1.0, 0.0]];

        let result = mean_filter(plane.view(), &MeanParams { size: 3.0 });
        let expected = box_reference(&plane, 3);

        assert_eq!(result.dim(), (1, 5));
        for (a, b) in result.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
        assert!((result[[0, 2]] - 2.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_mean_even_size_matches_direct_convolution() {
        let plane = checker(6, 7);

        let result = mean_filter(plane.view(), &MeanParams { size: 4.0 });
        let expected = box_reference(&plane, 4);

        for (a, b) in result.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_mean_nonpositive_is_passthrough() {
        let plane = checker(4, 4);

        assert_eq!(mean_filter(plane.view(), &MeanParams { size: 0.0 }), plane);
        assert_eq!(mean_filter(plane.view(), &MeanParams { size: -2.0 }), plane);
    }

    #[test]
    fn test_mean_size_one_is_identity() {
        let plane = checker(3, 5);
        let result = mean_filter(plane.view(), &MeanParams { size: 1.5 });
        assert_eq!(result, plane);
    }

    #[test]
    fn test_gaussian_nonpositive_is_passthrough() {
        let plane = checker(5, 5);

        assert_eq!(gaussian_filter(plane.view(), &GaussianParams { radius: 0.0 }), plane);
        assert_eq!(gaussian_filter(plane.view(), &GaussianParams { radius: -1.0 }), plane);
    }

    #[test]
    fn test_gaussian_smooths_checker() {
        let plane = checker(9, 9);

        let result = gaussian_filter(plane.view(), &GaussianParams { radius: 2.0 });

        // Borders repeat the edge pixel, so only the interior averages out
        assert!((result[[4, 4]] - 0.5).abs() < 0.05);
        assert!(result.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_radial_blur_constant_image() {
        let plane = Array2::<f32>::from_elem((8, 10), 0.25);

        let result = radial_blur(plane.view(), &RadialBlurParams { sigma: 3.0 }, Interpolation::Bicubic);

        assert_eq!(result.dim(), (8, 10));
        for v in result.iter() {
            assert!((v - 0.25).abs() < 1e-4);
        }
    }

    #[test]
    fn test_radial_blur_clamps() {
        let plane = checker(12, 12);

        let result = radial_blur(plane.view(), &RadialBlurParams { sigma: 2.0 }, Interpolation::Bicubic);

        assert!(result.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_radial_blur_zero_sigma_is_passthrough() {
        let plane = checker(4, 6);
        let result = radial_blur(plane.view(), &RadialBlurParams { sigma: 0.0 }, Interpolation::Bicubic);
        assert_eq!(result, plane);
    }
}
