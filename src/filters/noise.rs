//! Noise removal: Median filter.
//!
//! Works on a single channel plane with values 0.0-1.0.

use ndarray::{Array2, ArrayView2};

use crate::effects::MedianParams;

/// Half-width of the window for a requested median size, saturating.
fn median_radius(size: f32) -> usize {
    if !(size > 0.0) {
        return 0;
    }
    // f32 -> usize casts saturate, the doubling below must not overflow
    ((size / 2.0).floor() as usize).min(usize::MAX / 4)
}

/// Odd window edge length for a requested median size.
///
/// `floor(size / 2) * 2 + 1`, so 2.0 and 3.0 both give a 3x3 window.
pub fn median_window(size: f32) -> usize {
    median_radius(size) * 2 + 1
}

/// Apply median filter.
///
/// Removes salt-and-pepper noise while preserving edges. Taps past the
/// border repeat the edge pixel.
///
/// # Arguments
/// * `plane` - Channel values (height, width)
/// * `params` - Window size; `<= 0` is a passthrough
///
/// # Returns
/// Median-filtered plane with the same dimensions
pub fn median_filter(plane: ArrayView2<f32>, params: &MedianParams) -> Array2<f32> {
    if !(params.size > 0.0) {
        return plane.to_owned();
    }

    let (height, width) = plane.dim();
    // Capped at the image extent. Larger windows would repeat edge pixels
    // more often, so the result for them is an approximation.
    let radius = median_radius(params.size).min(height.max(width));
    let window_size = (radius * 2 + 1) * (radius * 2 + 1);

    let mut output = Array2::<f32>::zeros((height, width));
    let mut values: Vec<f32> = Vec::with_capacity(window_size);

    for y in 0..height {
        for x in 0..width {
            values.clear();

            for dy in 0..=(radius * 2) {
                let sy = (y as isize + dy as isize - radius as isize)
                    .clamp(0, height as isize - 1) as usize;

                for dx in 0..=(radius * 2) {
                    let sx = (x as isize + dx as isize - radius as isize)
                        .clamp(0, width as isize - 1) as usize;

                    values.push(plane[[sy, sx]]);
                }
            }

            values.sort_unstable_by(f32::total_cmp);
            output[[y, x]] = values[values.len() / 2].clamp(0.0, 1.0);
        }
    }

    output
}
