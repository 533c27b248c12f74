//! Effect library: pure per-channel image transforms.
//!
//! ## Supported Formats
//!
//! Every function works on one channel plane:
//!
//! | Format | Shape | Type | Description |
//! |--------|-------|------|-------------|
//! | Plane | (H, W) | f32 | One channel, 0.0-1.0 |
//!
//! Multi-channel images are split into planes by [`crate::channels`] and
//! each plane is processed independently, possibly on different threads.
//!
//! ## Architecture
//!
//! All filters follow these principles:
//! - **Pure** - No shared or global state, safe to run concurrently
//! - **Inverse mapping** - Geometric effects compute a source coordinate per output pixel
//! - **Clamped** - Output values always stay within 0.0-1.0
//! - **Passthrough on zero** - Filters with size/radius <= 0 return their input
//!
//! ## Filter Categories
//!
//! - **Distort**: fisheye, square_eye, swirl, waves, cylinder
//! - **Blur**: mean_filter, gaussian_filter, radial_blur
//! - **Noise**: median_filter

pub mod core;
pub mod distort;
pub mod blur;
pub mod noise;

pub use self::core::Interpolation;
