//! Geometric distortions: Fisheye, Square Eye, Swirl, Waves, Cylinder.
//!
//! Every effect is an inverse mapping: for each output pixel a source
//! coordinate is computed and the input is sampled there with the
//! requested [`Interpolation`]. Coordinates are `(row, col)` and all
//! functions work on a single channel plane with values 0.0-1.0.
//!
//! Output is always clamped to 0.0-1.0.

use ndarray::{Array2, ArrayView2};

use super::core::{clamp_unit, flip_vertical, remap, Interpolation};
use crate::effects::{CylinderParams, FishEyeParams, SquareEyeParams, SwirlParams, WavesParams};

// ============================================================================
// Fisheye / Square Eye
// ============================================================================

/// Pull pixels towards a center point.
///
/// The displacement `R = center - target` is scaled by the falloff weight
/// of `|R|`, so pixels near the center are magnified.
///
/// # Arguments
/// * `plane` - Channel values (height, width)
/// * `params` - Center, radius `sigma` and falloff shape
/// * `interpolation` - Sampling kernel
///
/// # Returns
/// Distorted plane with the same dimensions
pub fn fisheye(plane: ArrayView2<f32>, params: &FishEyeParams, interpolation: Interpolation) -> Array2<f32> {
    if params.sigma <= 0.0 {
        return plane.mapv(clamp_unit);
    }

    let (cy, cx) = (params.center_y, params.center_x);
    remap(plane, plane.dim(), interpolation, |y, x| {
        let ry = cy - y as f32;
        let rx = cx - x as f32;
        let weight = params.falloff.weight((ry * ry + rx * rx).sqrt(), params.sigma);
        (y as f32 + ry * weight, x as f32 + rx * weight)
    })
}

/// Minkowski distance `(|dy|^p + |dx|^p)^(1/p)`.
#[inline]
fn lp_norm(dy: f32, dx: f32, p: f32) -> f32 {
    (dy.abs().powf(p) + dx.abs().powf(p)).powf(1.0 / p)
}

/// Fisheye variant measuring distance with an Lp norm.
///
/// `p = 2` gives round lenses, large `p` square ones and `p < 1`
/// star-shaped ones.
pub fn square_eye(plane: ArrayView2<f32>, params: &SquareEyeParams, interpolation: Interpolation) -> Array2<f32> {
    if params.sigma <= 0.0 {
        return plane.mapv(clamp_unit);
    }

    let (cy, cx) = (params.center_y, params.center_x);
    remap(plane, plane.dim(), interpolation, |y, x| {
        let ry = cy - y as f32;
        let rx = cx - x as f32;
        let weight = params.falloff.weight(lp_norm(ry, rx, params.p), params.sigma);
        (y as f32 + ry * weight, x as f32 + rx * weight)
    })
}

// ============================================================================
// Swirl
// ============================================================================

/// Rotate pixels around a center, strongest close to it.
///
/// The polar angle of each target is advanced by
/// `magnitude * exp(-(r / r_max)^2 / (2 sigma^2))`, where `r_max` is the
/// largest center distance inside the image.
pub fn swirl(plane: ArrayView2<f32>, params: &SwirlParams, interpolation: Interpolation) -> Array2<f32> {
    let (height, width) = plane.dim();
    let (cy, cx) = (params.center_y, params.center_x);

    // Distance to a point is convex, so the maximum sits on a corner
    let corners = [
        (0.0, 0.0),
        (0.0, width.saturating_sub(1) as f32),
        (height.saturating_sub(1) as f32, 0.0),
        (height.saturating_sub(1) as f32, width.saturating_sub(1) as f32),
    ];
    let r_max = corners
        .iter()
        .map(|&(y, x): &(f32, f32)| (y - cy).hypot(x - cx))
        .fold(0.0f32, f32::max);

    if params.sigma <= 0.0 || r_max <= 0.0 {
        return plane.mapv(clamp_unit);
    }

    let spread = 2.0 * params.sigma * params.sigma;
    remap(plane, (height, width), interpolation, |y, x| {
        let dy = y as f32 - cy;
        let dx = x as f32 - cx;
        let r = dy.hypot(dx);
        let dist = r / r_max;
        let angle = dx.atan2(dy) + params.magnitude * (-dist * dist / spread).exp();
        (cy + r * angle.cos(), cx + r * angle.sin())
    })
}

// ============================================================================
// Waves
// ============================================================================

/// Output `(height, width)` of [`waves`] for an input plane.
pub fn waves_shape(height: usize, width: usize, params: &WavesParams) -> (usize, usize) {
    (
        (height as f32 + 2.0 * params.amplitude_y).ceil() as usize,
        (width as f32 + 2.0 * params.amplitude_x).ceil() as usize,
    )
}

/// Sinusoidal displacement on a canvas padded by twice the amplitude.
///
/// Both offsets are driven by the row coordinate: the row offset by the
/// target row, the column offset by the already displaced source row.
///
/// # Returns
/// Plane of shape [`waves_shape`]
pub fn waves(plane: ArrayView2<f32>, params: &WavesParams, interpolation: Interpolation) -> Array2<f32> {
    let (height, width) = plane.dim();
    let shape = waves_shape(height, width, params);
    let (ay, ax) = (params.amplitude_y, params.amplitude_x);

    remap(plane, shape, interpolation, |y, x| {
        let row = y as f32 + ay * (y as f32 / params.frequency + params.phase_y).sin() - ay;
        let col = x as f32 + ax * (row / params.frequency + params.phase_x).sin() - ax;
        (row, col)
    })
}

// ============================================================================
// Cylinder Anamorphosis
// ============================================================================

/// Unroll the image around a cylinder placed at the image center.
///
/// The polar angle of each target (normalized over the image to 0..1 and
/// rotated by `angle_shift / 360`) selects the source column, the radius
/// selects the source row of the vertically flipped input.
pub fn cylinder(plane: ArrayView2<f32>, params: &CylinderParams, interpolation: Interpolation) -> Array2<f32> {
    let (height, width) = plane.dim();
    let cy = (height / 2) as f32;
    let cx = (width / 2) as f32;
    let radius_scale = (height / 2).max(1) as f32;

    let angle_at = |y: usize, x: usize| (y as f32 - cy).atan2(x as f32 - cx);

    // First pass: angle range over the whole image
    let mut min_angle = f32::INFINITY;
    let mut max_angle = f32::NEG_INFINITY;
    for y in 0..height {
        for x in 0..width {
            let a = angle_at(y, x);
            min_angle = min_angle.min(a);
            max_angle = max_angle.max(a);
        }
    }
    let range = max_angle - min_angle;
    let shift = params.angle_shift / 360.0;

    let flipped = flip_vertical(plane);
    remap(flipped.view(), (height, width), interpolation, |y, x| {
        let r = (y as f32 - cy).hypot(x as f32 - cx);
        let normalized = if range > 0.0 {
            (angle_at(y, x) - min_angle) / range
        } else {
            0.0
        };
        let t = (normalized + shift).rem_euclid(1.0);
        (r / radius_scale * height.saturating_sub(1) as f32, t * width.saturating_sub(1) as f32)
    })
}
