//! Core utilities shared by the effect implementations.
//!
//! This module provides:
//! - Gaussian kernel generation
//! - Separable Gaussian blur (edge-clamped and wrap-around)
//! - Sub-pixel sampling (nearest, bilinear, bicubic)
//! - Inverse coordinate remapping
//! - Plane flips and `[0, 1]` clamping

use ndarray::{s, Array2, ArrayView2};

/// Clamp a sample into `[0, 1]`. NaN maps to 0.
#[inline]
pub fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Tails longer than this are integrated instead of summed tap by tap.
const MAX_TAIL_TAPS: usize = 1 << 16;

/// Error function, Abramowitz-Stegun 7.1.26 (|error| < 1.5e-7).
fn erf(x: f64) -> f64 {
    let sign = x.signum();
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.3275911 * x);
    let poly = ((((1.061405429 * t - 1.453152027) * t + 1.421413741) * t - 0.284496736) * t + 0.254829592) * t;
    sign * (1.0 - poly * (-x * x).exp())
}

/// Generate a 1D Gaussian kernel of at most `2 * max_half + 1` taps.
///
/// The full kernel spans 6 sigma. When that is wider than `max_half`, the
/// weight of every cut-off tap is added to the outermost tap on its side,
/// which is exact for edge-clamped convolution once `max_half` reaches the
/// plane extent.
///
/// # Arguments
/// * `sigma` - Standard deviation of the Gaussian; infinity acts as `f32::MAX`
/// * `max_half` - Largest half-width to materialize
///
/// # Returns
/// Normalized 1D kernel as Vec<f32>
pub fn gaussian_kernel_1d(sigma: f32, max_half: usize) -> Vec<f32> {
    if !(sigma > 0.0) {
        return vec![1.0];
    }
    let sigma = sigma.min(f32::MAX) as f64;

    // Kernel size = 6 sigma (covers 99.7% of distribution), ensure odd
    let full_half = (((sigma * 6.0).ceil() as usize) | 1) / 2;
    let half = full_half.min(max_half);
    let weight = |x: f64| (-x * x / (2.0 * sigma * sigma)).exp();

    let mut kernel: Vec<f64> = (0..=2 * half)
        .map(|i| weight(i as f64 - half as f64))
        .collect();

    if full_half > half {
        let tail = if full_half - half <= MAX_TAIL_TAPS {
            ((half + 1)..=full_half).map(|k| weight(k as f64)).sum()
        } else {
            let scale = sigma * std::f64::consts::SQRT_2;
            let a = (half as f64 + 0.5) / scale;
            let b = (full_half as f64 + 0.5) / scale;
            if b < 1e-3 {
                // Flat over the whole tail, below the erf approximation error
                (full_half - half) as f64
            } else {
                sigma * (std::f64::consts::PI / 2.0).sqrt() * (erf(b) - erf(a))
            }
        };
        kernel[0] += tail;
        kernel[2 * half] += tail;
    }

    let sum: f64 = kernel.iter().sum();
    kernel.iter().map(|v| (v / sum) as f32).collect()
}

/// Apply a separable Gaussian blur to one channel plane.
///
/// Taps past the border repeat the edge pixel.
///
/// # Arguments
/// * `plane` - Channel values, 0.0-1.0
/// * `sigma` - Blur radius (standard deviation)
///
/// # Returns
/// Blurred plane clamped to 0.0-1.0
pub fn gaussian_blur_plane(plane: ArrayView2<f32>, sigma: f32) -> Array2<f32> {
    let (height, width) = plane.dim();
    let kernel = gaussian_kernel_1d(sigma, height.max(width));
    let half = kernel.len() / 2;

    let mut temp = Array2::<f32>::zeros((height, width));
    let mut result = Array2::<f32>::zeros((height, width));

    // Horizontal pass
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f32;
            for (ki, &kv) in kernel.iter().enumerate() {
                let sx = (x as isize + ki as isize - half as isize)
                    .clamp(0, width as isize - 1) as usize;
                sum += plane[[y, sx]] * kv;
            }
            temp[[y, x]] = sum;
        }
    }

    // Vertical pass
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f32;
            for (ki, &kv) in kernel.iter().enumerate() {
                let sy = (y as isize + ki as isize - half as isize)
                    .clamp(0, height as isize - 1) as usize;
                sum += temp[[sy, x]] * kv;
            }
            result[[y, x]] = sum;
        }
    }

    result.mapv(clamp_unit)
}

/// 1D Gaussian blur along the row axis with wrap-around at both ends.
///
/// Used on polar planes, where the first and last rows are neighbours.
/// Kernels longer than the plane are folded onto one period, and sigma is
/// capped at the height, where the wrapped Gaussian is already flat.
pub fn gaussian_blur_rows_wrap(plane: ArrayView2<f32>, sigma: f32) -> Array2<f32> {
    let (height, width) = plane.dim();
    if height == 0 || !(sigma > 0.0) {
        return plane.to_owned();
    }

    let kernel = gaussian_kernel_1d(sigma.min(height as f32), usize::MAX);
    let half = kernel.len() as isize / 2;

    // (offset, weight) taps, one per row residue once the kernel wraps
    let taps: Vec<(isize, f32)> = if kernel.len() <= height {
        kernel.iter().enumerate().map(|(ki, &kv)| (ki as isize - half, kv)).collect()
    } else {
        let mut folded = vec![0.0f32; height];
        for (ki, &kv) in kernel.iter().enumerate() {
            folded[(ki as isize - half).rem_euclid(height as isize) as usize] += kv;
        }
        folded.into_iter().enumerate().map(|(r, kv)| (r as isize, kv)).collect()
    };

    let mut result = Array2::<f32>::zeros((height, width));
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f32;
            for &(offset, kv) in &taps {
                let sy = (y as isize + offset).rem_euclid(height as isize) as usize;
                sum += plane[[sy, x]] * kv;
            }
            result[[y, x]] = sum;
        }
    }

    result
}

/// Interpolation kernel used when sampling at fractional coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    Nearest,
    Bilinear,
    /// Catmull-Rom cubic, exact at integer coordinates.
    #[default]
    Bicubic,
}

/// Fetch a pixel, repeating the edge for out-of-range indices.
#[inline]
fn pixel_clamped(plane: &ArrayView2<f32>, y: isize, x: isize) -> f32 {
    let (height, width) = plane.dim();
    let sy = y.clamp(0, height as isize - 1) as usize;
    let sx = x.clamp(0, width as isize - 1) as usize;
    plane[[sy, sx]]
}

#[inline]
fn catmull_rom_weights(t: f32) -> [f32; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        (-t3 + 2.0 * t2 - t) * 0.5,
        (3.0 * t3 - 5.0 * t2 + 2.0) * 0.5,
        (-3.0 * t3 + 4.0 * t2 + t) * 0.5,
        (t3 - t2) * 0.5,
    ]
}

/// Sample a plane at a fractional `(row, col)` position.
///
/// Out-of-bounds taps repeat the nearest edge pixel. Non-finite
/// coordinates sample as 0.
pub fn sample(plane: &ArrayView2<f32>, row: f32, col: f32, interpolation: Interpolation) -> f32 {
    let (height, width) = plane.dim();
    if height == 0 || width == 0 || !row.is_finite() || !col.is_finite() {
        return 0.0;
    }

    // Far-away coordinates behave like the edge; keep the integer math small.
    let row = row.clamp(-2.0, height as f32 + 1.0);
    let col = col.clamp(-2.0, width as f32 + 1.0);

    match interpolation {
        Interpolation::Nearest => pixel_clamped(plane, row.round() as isize, col.round() as isize),
        Interpolation::Bilinear => {
            let y0 = row.floor() as isize;
            let x0 = col.floor() as isize;
            let fy = row - row.floor();
            let fx = col - col.floor();

            let p00 = pixel_clamped(plane, y0, x0);
            let p01 = pixel_clamped(plane, y0, x0 + 1);
            let p10 = pixel_clamped(plane, y0 + 1, x0);
            let p11 = pixel_clamped(plane, y0 + 1, x0 + 1);

            p00 * (1.0 - fx) * (1.0 - fy) + p01 * fx * (1.0 - fy) + p10 * (1.0 - fx) * fy + p11 * fx * fy
        }
        Interpolation::Bicubic => {
            let y0 = row.floor() as isize;
            let x0 = col.floor() as isize;
            let wy = catmull_rom_weights(row - row.floor());
            let wx = catmull_rom_weights(col - col.floor());

            let mut sum = 0.0f32;
            for (j, &ky) in wy.iter().enumerate() {
                if ky == 0.0 {
                    continue;
                }
                let sy = y0 + j as isize - 1;
                let mut line = 0.0f32;
                for (i, &kx) in wx.iter().enumerate() {
                    if kx == 0.0 {
                        continue;
                    }
                    line += pixel_clamped(plane, sy, x0 + i as isize - 1) * kx;
                }
                sum += line * ky;
            }
            sum
        }
    }
}

/// Build an output plane by inverse mapping.
///
/// For every output pixel `(y, x)` of `shape`, `source(y, x)` returns the
/// `(row, col)` to sample in `plane`. Results are clamped to 0.0-1.0.
///
/// # Arguments
/// * `plane` - Source channel
/// * `shape` - Output `(height, width)`
/// * `interpolation` - Sampling kernel
/// * `source` - Output-to-source coordinate mapping
pub fn remap<F>(plane: ArrayView2<f32>, shape: (usize, usize), interpolation: Interpolation, source: F) -> Array2<f32>
where
    F: Fn(usize, usize) -> (f32, f32),
{
    Array2::from_shape_fn(shape, |(y, x)| {
        let (row, col) = source(y, x);
        clamp_unit(sample(&plane, row, col, interpolation))
    })
}

/// Mirror a plane top-to-bottom.
pub fn flip_vertical(plane: ArrayView2<f32>) -> Array2<f32> {
    plane.slice(s![..;-1, ..]).to_owned()
}

/// Mirror a plane left-to-right.
pub fn flip_horizontal(plane: ArrayView2<f32>) -> Array2<f32> {
    plane.slice(s![.., ..;-1]).to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(height: usize, width: usize) -> Array2<f32> {
        Array2::from_shape_fn((height, width), |(y, x)| (y * width + x) as f32 / (height * width) as f32)
    }

    #[test]
    fn test_gaussian_kernel_normalized() {
        let kernel = gaussian_kernel_1d(2.0, usize::MAX);
        let sum: f32 = kernel.iter().sum();

        assert_eq!(kernel.len() % 2, 1);
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(kernel[kernel.len() / 2] > kernel[0]);
    }

    #[test]
    fn test_gaussian_kernel_zero_sigma() {
        assert_eq!(gaussian_kernel_1d(0.0, 8), vec![1.0]);
        assert_eq!(gaussian_kernel_1d(f32::NAN, 8), vec![1.0]);
    }

    #[test]
    fn test_gaussian_kernel_truncation_folds_tails() {
        let full = gaussian_kernel_1d(2.0, usize::MAX);
        let cut = gaussian_kernel_1d(2.0, 3);
        let full_half = full.len() / 2;

        assert_eq!(cut.len(), 7);
        // Inner taps keep their weight, the outer pair absorbs the tails
        for i in 1..6 {
            assert!((cut[i] - full[full_half - 3 + i]).abs() < 1e-6);
        }
        let tail: f32 = full[..=full_half - 3].iter().sum();
        assert!((cut[0] - tail).abs() < 1e-6);
        assert!((cut[6] - cut[0]).abs() < 1e-7);
    }

    #[test]
    fn test_gaussian_kernel_huge_sigma_is_bounded() {
        for sigma in [1e9f32, f32::MAX, f32::INFINITY] {
            let kernel = gaussian_kernel_1d(sigma, 4);
            let sum: f32 = kernel.iter().sum();

            assert_eq!(kernel.len(), 9);
            assert!(kernel.iter().all(|v| v.is_finite() && *v >= 0.0));
            assert!((sum - 1.0).abs() < 1e-5);
            // Nearly all weight sits in the folded tails
            assert!(kernel[0] > 0.49 && kernel[8] > 0.49);
        }
    }

    /// Edge-clamped separable blur with the untruncated kernel.
    fn blur_reference(plane: &Array2<f32>, sigma: f32) -> Array2<f32> {
        let kernel = gaussian_kernel_1d(sigma, usize::MAX);
        let half = (kernel.len() / 2) as isize;
        let (height, width) = plane.dim();
        let at = |y: isize, x: isize| {
            plane[[y.clamp(0, height as isize - 1) as usize, x.clamp(0, width as isize - 1) as usize]]
        };
        Array2::from_shape_fn((height, width), |(y, x)| {
            let mut sum = 0.0f32;
            for (j, &ky) in kernel.iter().enumerate() {
                for (i, &kx) in kernel.iter().enumerate() {
                    sum += at(y as isize + j as isize - half, x as isize + i as isize - half) * ky * kx;
                }
            }
            sum
        })
    }

    #[test]
    fn test_blur_plane_truncated_kernel_matches_full() {
        let plane = ramp(3, 3);

        // sigma 2 needs 6 taps per side, the 3x3 plane keeps 3
        let result = gaussian_blur_plane(plane.view(), 2.0);
        let expected = blur_reference(&plane, 2.0);

        for (a, b) in result.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_blur_plane_huge_sigma_averages_corners() {
        let plane = ramp(3, 3);
        let corners = (plane[[0, 0]] + plane[[0, 2]] + plane[[2, 0]] + plane[[2, 2]]) / 4.0;

        for sigma in [1e9f32, f32::INFINITY] {
            let result = gaussian_blur_plane(plane.view(), sigma);

            assert_eq!(result.dim(), (3, 3));
            for v in result.iter() {
                assert!((v - corners).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_blur_wrap_huge_sigma_is_column_mean() {
        let mut plane = Array2::<f32>::zeros((8, 2));
        plane[[0, 0]] = 1.0;
        plane[[3, 1]] = 0.5;

        let result = gaussian_blur_rows_wrap(plane.view(), 1e9);

        for y in 0..8 {
            assert!((result[[y, 0]] - 0.125).abs() < 1e-3);
            assert!((result[[y, 1]] - 0.0625).abs() < 1e-3);
        }
    }

    #[test]
    fn test_sample_exact_at_integer_coordinates() {
        let plane = ramp(4, 4);
        let view = plane.view();

        for interpolation in [Interpolation::Nearest, Interpolation::Bilinear, Interpolation::Bicubic] {
            for y in 0..4 {
                for x in 0..4 {
                    assert_eq!(sample(&view, y as f32, x as f32, interpolation), plane[[y, x]]);
                }
            }
        }
    }

    #[test]
    fn test_bilinear_midpoint() {
        let mut plane = Array2::<f32>::zeros((1, 2));
        plane[[0, 1]] = 1.0;

        let v = sample(&plane.view(), 0.0, 0.5, Interpolation::Bilinear);

        assert!((v - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_sample_clamps_outside() {
        let plane = ramp(3, 3);
        let view = plane.view();

        assert_eq!(sample(&view, -10.0, -10.0, Interpolation::Bicubic), plane[[0, 0]]);
        assert_eq!(sample(&view, 1e9, 1e9, Interpolation::Bilinear), plane[[2, 2]]);
        assert_eq!(sample(&view, f32::NAN, 0.0, Interpolation::Bicubic), 0.0);
    }

    #[test]
    fn test_remap_identity() {
        let plane = ramp(5, 3);
        let result = remap(plane.view(), (5, 3), Interpolation::Bicubic, |y, x| (y as f32, x as f32));
        assert_eq!(result, plane);
    }

    #[test]
    fn test_blur_wrap_constant() {
        let plane = Array2::<f32>::from_elem((6, 2), 0.4);
        let result = gaussian_blur_rows_wrap(plane.view(), 1.5);
        for v in result.iter() {
            assert!((v - 0.4).abs() < 1e-5);
        }
    }

    #[test]
    fn test_blur_wrap_connects_ends() {
        let mut plane = Array2::<f32>::zeros((8, 1));
        plane[[0, 0]] = 1.0;

        let result = gaussian_blur_rows_wrap(plane.view(), 1.0);

        // The last row is one step away from the first one
        assert!((result[[7, 0]] - result[[1, 0]]).abs() < 1e-6);
        assert!(result[[7, 0]] > 0.0);
    }

    #[test]
    fn test_flips() {
        let plane = ramp(2, 3);

        let v = flip_vertical(plane.view());
        let h = flip_horizontal(plane.view());

        assert_eq!(v[[0, 0]], plane[[1, 0]]);
        assert_eq!(h[[0, 0]], plane[[0, 2]]);
    }
}
