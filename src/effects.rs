//! Effect selection and typed parameter records.
//!
//! Each effect kind has one parameter record with the defaults the editor
//! starts with. [`Effect`] pairs a kind with its record and dispatches to
//! the matching function in [`crate::filters`]; [`ChannelTransform`] is the
//! seam the worker executes, so custom per-channel functions can run next
//! to the built-in effects.

use ndarray::{Array2, ArrayView2};

use crate::channels;
use crate::error::{Result, TransformError};
use crate::filters::{blur, distort, noise, Interpolation};
use crate::image::Image;

// ============================================================================
// Effect kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    FishEye,
    Swirl,
    Waves,
    Cylinder,
    RadialBlur,
    SquareEye,
    Median,
    Gaussian,
    Mean,
}

impl EffectKind {
    pub const ALL: [EffectKind; 9] = [
        EffectKind::FishEye,
        EffectKind::Swirl,
        EffectKind::Waves,
        EffectKind::Cylinder,
        EffectKind::RadialBlur,
        EffectKind::SquareEye,
        EffectKind::Median,
        EffectKind::Gaussian,
        EffectKind::Mean,
    ];

    /// Label recorded in the history when the effect is applied.
    pub fn label(self) -> &'static str {
        match self {
            EffectKind::FishEye => "fish eye effect",
            EffectKind::Swirl => "swirl effect",
            EffectKind::Waves => "waves effect",
            EffectKind::Cylinder => "cylinder effect",
            EffectKind::RadialBlur => "radial blur effect",
            EffectKind::SquareEye => "square eye effect",
            EffectKind::Median => "median blur effect",
            EffectKind::Gaussian => "gaussian blur effect",
            EffectKind::Mean => "mean blur effect",
        }
    }
}

// ============================================================================
// Parameter records
// ============================================================================

/// Radial weight applied to a lens displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Falloff {
    /// `1 - d / sigma` inside `sigma`, 0 outside.
    Linear,
    /// `exp(-d^2 / (2 sigma^2))`
    Gaussian,
}

impl Falloff {
    /// Parse `"linear"` or `"gaussian"`, ignoring case.
    pub fn from_name(name: &str) -> Option<Falloff> {
        match name.to_ascii_lowercase().as_str() {
            "linear" => Some(Falloff::Linear),
            "gaussian" => Some(Falloff::Gaussian),
            _ => None,
        }
    }

    #[inline]
    pub fn weight(self, distance: f32, sigma: f32) -> f32 {
        match self {
            Falloff::Linear => {
                if distance < sigma {
                    1.0 - distance / sigma
                } else {
                    0.0
                }
            }
            Falloff::Gaussian => (-distance * distance / (2.0 * sigma * sigma)).exp(),
        }
    }
}

fn check_finite(effect: &'static str, name: &'static str, value: f32) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(TransformError::invalid(effect, name, format!("must be finite, got {value}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FishEyeParams {
    pub center_x: f32,
    pub center_y: f32,
    /// Lens radius in pixels.
    pub sigma: f32,
    pub falloff: Falloff,
}

impl Default for FishEyeParams {
    fn default() -> Self {
        FishEyeParams {
            center_x: 0.0,
            center_y: 0.0,
            sigma: 1.0,
            falloff: Falloff::Linear,
        }
    }
}

impl FishEyeParams {
    pub fn validate(&self) -> Result<()> {
        check_finite("fisheye", "center_x", self.center_x)?;
        check_finite("fisheye", "center_y", self.center_y)?;
        check_finite("fisheye", "sigma", self.sigma)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwirlParams {
    pub center_x: f32,
    pub center_y: f32,
    /// Spread of the twist relative to the largest center distance.
    pub sigma: f32,
    /// Rotation at the center, in radians.
    pub magnitude: f32,
}

impl Default for SwirlParams {
    fn default() -> Self {
        SwirlParams {
            center_x: 0.0,
            center_y: 0.0,
            sigma: 0.01,
            magnitude: 0.0,
        }
    }
}

impl SwirlParams {
    pub fn validate(&self) -> Result<()> {
        check_finite("swirl", "center_x", self.center_x)?;
        check_finite("swirl", "center_y", self.center_y)?;
        check_finite("swirl", "sigma", self.sigma)?;
        check_finite("swirl", "magnitude", self.magnitude)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WavesParams {
    /// Column displacement amplitude; also pads the canvas width by twice its value.
    pub amplitude_x: f32,
    /// Row displacement amplitude; also pads the canvas height by twice its value.
    pub amplitude_y: f32,
    /// Wave length divisor applied to the row coordinate.
    pub frequency: f32,
    pub phase_x: f32,
    pub phase_y: f32,
}

impl Default for WavesParams {
    fn default() -> Self {
        WavesParams {
            amplitude_x: 0.1,
            amplitude_y: 0.1,
            frequency: 0.1,
            phase_x: 0.0,
            phase_y: 0.0,
        }
    }
}

impl WavesParams {
    pub fn validate(&self) -> Result<()> {
        check_finite("waves", "amplitude_x", self.amplitude_x)?;
        check_finite("waves", "amplitude_y", self.amplitude_y)?;
        check_finite("waves", "frequency", self.frequency)?;
        check_finite("waves", "phase_x", self.phase_x)?;
        check_finite("waves", "phase_y", self.phase_y)?;
        if self.amplitude_x < 0.0 {
            return Err(TransformError::invalid("waves", "amplitude_x", "must not be negative"));
        }
        if self.amplitude_y < 0.0 {
            return Err(TransformError::invalid("waves", "amplitude_y", "must not be negative"));
        }
        if self.frequency <= 0.0 {
            return Err(TransformError::invalid("waves", "frequency", "must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CylinderParams {
    /// Rotation of the unrolled image, in degrees.
    pub angle_shift: f32,
}

impl CylinderParams {
    pub fn validate(&self) -> Result<()> {
        check_finite("cylinder", "angle_shift", self.angle_shift)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadialBlurParams {
    pub sigma: f32,
}

impl Default for RadialBlurParams {
    fn default() -> Self {
        RadialBlurParams { sigma: 0.1 }
    }
}

impl RadialBlurParams {
    pub fn validate(&self) -> Result<()> {
        check_finite("radial blur", "sigma", self.sigma)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SquareEyeParams {
    pub center_x: f32,
    pub center_y: f32,
    pub sigma: f32,
    /// Exponent of the Lp distance, must be positive.
    pub p: f32,
    pub falloff: Falloff,
}

impl Default for SquareEyeParams {
    fn default() -> Self {
        SquareEyeParams {
            center_x: 0.0,
            center_y: 0.0,
            sigma: 1.0,
            p: 0.1,
            falloff: Falloff::Gaussian,
        }
    }
}

impl SquareEyeParams {
    pub fn validate(&self) -> Result<()> {
        check_finite("square eye", "center_x", self.center_x)?;
        check_finite("square eye", "center_y", self.center_y)?;
        check_finite("square eye", "sigma", self.sigma)?;
        check_finite("square eye", "p", self.p)?;
        if self.p <= 0.0 {
            return Err(TransformError::invalid("square eye", "p", "must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MedianParams {
    pub size: f32,
}

impl Default for MedianParams {
    fn default() -> Self {
        MedianParams { size: 3.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GaussianParams {
    pub radius: f32,
}

impl Default for GaussianParams {
    fn default() -> Self {
        GaussianParams { radius: 2.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeanParams {
    pub size: f32,
}

impl Default for MeanParams {
    fn default() -> Self {
        MeanParams { size: 3.0 }
    }
}

// ============================================================================
// Effect
// ============================================================================

/// One effect kind together with a snapshot of its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FishEye(FishEyeParams),
    Swirl(SwirlParams),
    Waves(WavesParams),
    Cylinder(CylinderParams),
    RadialBlur(RadialBlurParams),
    SquareEye(SquareEyeParams),
    Median(MedianParams),
    Gaussian(GaussianParams),
    Mean(MeanParams),
}

impl Effect {
    pub fn kind(&self) -> EffectKind {
        match self {
            Effect::FishEye(_) => EffectKind::FishEye,
            Effect::Swirl(_) => EffectKind::Swirl,
            Effect::Waves(_) => EffectKind::Waves,
            Effect::Cylinder(_) => EffectKind::Cylinder,
            Effect::RadialBlur(_) => EffectKind::RadialBlur,
            Effect::SquareEye(_) => EffectKind::SquareEye,
            Effect::Median(_) => EffectKind::Median,
            Effect::Gaussian(_) => EffectKind::Gaussian,
            Effect::Mean(_) => EffectKind::Mean,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Effect::FishEye(p) => p.validate(),
            Effect::Swirl(p) => p.validate(),
            Effect::Waves(p) => p.validate(),
            Effect::Cylinder(p) => p.validate(),
            Effect::RadialBlur(p) => p.validate(),
            Effect::SquareEye(p) => p.validate(),
            // Non-positive sizes are a passthrough in the filters
            Effect::Median(p) => check_finite("median", "size", p.size),
            Effect::Gaussian(p) => check_finite("gaussian", "radius", p.radius),
            Effect::Mean(p) => check_finite("mean", "size", p.size),
        }
    }

    /// Run the effect on one channel plane with bicubic sampling.
    pub fn apply(&self, plane: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.apply_with(plane, Interpolation::default())
    }

    /// Run the effect on one channel plane.
    ///
    /// `interpolation` only matters for the geometric effects.
    pub fn apply_with(&self, plane: ArrayView2<f32>, interpolation: Interpolation) -> Result<Array2<f32>> {
        self.validate()?;
        if plane.is_empty() {
            return Ok(plane.to_owned());
        }

        let output = match self {
            Effect::FishEye(p) => distort::fisheye(plane, p, interpolation),
            Effect::Swirl(p) => distort::swirl(plane, p, interpolation),
            Effect::Waves(p) => distort::waves(plane, p, interpolation),
            Effect::Cylinder(p) => distort::cylinder(plane, p, interpolation),
            Effect::RadialBlur(p) => blur::radial_blur(plane, p, interpolation),
            Effect::SquareEye(p) => distort::square_eye(plane, p, interpolation),
            Effect::Median(p) => noise::median_filter(plane, p),
            Effect::Gaussian(p) => blur::gaussian_filter(plane, p),
            Effect::Mean(p) => blur::mean_filter(plane, p),
        };
        Ok(output)
    }
}

// ============================================================================
// Channel transforms
// ============================================================================

/// A function from one channel plane to another, runnable on any thread.
pub trait ChannelTransform: Send + Sync {
    /// Name used in logs, errors and history labels.
    fn name(&self) -> &str;

    fn apply(&self, plane: ArrayView2<'_, f32>) -> Result<Array2<f32>>;
}

impl ChannelTransform for Effect {
    fn name(&self) -> &str {
        self.kind().label()
    }

    fn apply(&self, plane: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        self.apply_with(plane, Interpolation::default())
    }
}

/// A named closure usable wherever a [`ChannelTransform`] is expected.
pub struct FnTransform<F> {
    name: String,
    func: F,
}

impl<F> FnTransform<F> {
    pub fn new(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(ArrayView2<'_, f32>) -> Result<Array2<f32>> + Send + Sync,
    {
        FnTransform {
            name: name.into(),
            func,
        }
    }
}

impl<F> ChannelTransform for FnTransform<F>
where
    F: Fn(ArrayView2<'_, f32>) -> Result<Array2<f32>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, plane: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        (self.func)(plane)
    }
}

/// Apply a transform to every channel of an image on the calling thread.
///
/// This is the non-fan-out path: split, transform each plane in order, join.
pub fn apply_to_image(transform: &dyn ChannelTransform, image: &Image) -> Result<Image> {
    let planes = channels::split(image)
        .iter()
        .map(|plane| transform.apply(plane.view()))
        .collect::<Result<Vec<_>>>()?;
    channels::join(planes)
}

// ============================================================================
// Settings
// ============================================================================

/// Current parameters of every effect, as edited by the user.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EffectSettings {
    pub fisheye: FishEyeParams,
    pub swirl: SwirlParams,
    pub waves: WavesParams,
    pub cylinder: CylinderParams,
    pub radial_blur: RadialBlurParams,
    pub square_eye: SquareEyeParams,
    pub median: MedianParams,
    pub gaussian: GaussianParams,
    pub mean: MeanParams,
}

impl EffectSettings {
    /// Snapshot the stored parameters of one effect.
    pub fn effect(&self, kind: EffectKind) -> Effect {
        match kind {
            EffectKind::FishEye => Effect::FishEye(self.fisheye.clone()),
            EffectKind::Swirl => Effect::Swirl(self.swirl.clone()),
            EffectKind::Waves => Effect::Waves(self.waves.clone()),
            EffectKind::Cylinder => Effect::Cylinder(self.cylinder.clone()),
            EffectKind::RadialBlur => Effect::RadialBlur(self.radial_blur.clone()),
            EffectKind::SquareEye => Effect::SquareEye(self.square_eye.clone()),
            EffectKind::Median => Effect::Median(self.median.clone()),
            EffectKind::Gaussian => Effect::Gaussian(self.gaussian.clone()),
            EffectKind::Mean => Effect::Mean(self.mean.clone()),
        }
    }

    pub fn set(&mut self, effect: Effect) {
        match effect {
            Effect::FishEye(p) => self.fisheye = p,
            Effect::Swirl(p) => self.swirl = p,
            Effect::Waves(p) => self.waves = p,
            Effect::Cylinder(p) => self.cylinder = p,
            Effect::RadialBlur(p) => self.radial_blur = p,
            Effect::SquareEye(p) => self.square_eye = p,
            Effect::Median(p) => self.median = p,
            Effect::Gaussian(p) => self.gaussian = p,
            Effect::Mean(p) => self.mean = p,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    /// Deterministic pseudo-random plane (MINSTD LCG).
    fn noisy_plane(height: usize, width: usize, seed: u64) -> Array2<f32> {
        let mut state = seed.wrapping_add(1);
        Array2::from_shape_fn((height, width), |_| {
            state = state.wrapping_mul(48271).wrapping_add(1) % 2147483647;
            state as f32 / 2147483647.0
        })
    }

    fn sample_effects() -> Vec<Effect> {
        vec![
            Effect::FishEye(FishEyeParams {
                center_x: 6.0,
                center_y: 4.0,
                sigma: 5.0,
                falloff: Falloff::Linear,
            }),
            Effect::Swirl(SwirlParams {
                center_x: 5.0,
                center_y: 5.0,
                sigma: 0.4,
                magnitude: 4.0,
            }),
            Effect::Waves(WavesParams {
                amplitude_x: 2.0,
                amplitude_y: 3.0,
                frequency: 1.5,
                phase_x: 0.3,
                phase_y: 1.0,
            }),
            Effect::Cylinder(CylinderParams { angle_shift: 45.0 }),
            Effect::RadialBlur(RadialBlurParams { sigma: 2.0 }),
            Effect::SquareEye(SquareEyeParams {
                center_x: 3.0,
                center_y: 7.0,
                sigma: 6.0,
                p: 4.0,
                falloff: Falloff::Gaussian,
            }),
            Effect::Median(MedianParams { size: 3.0 }),
            Effect::Gaussian(GaussianParams { radius: 1.5 }),
            Effect::Mean(MeanParams { size: 4.0 }),
        ]
    }

    #[test]
    fn test_all_effects_clamp_output() {
        for seed in 0..3u64 {
            let plane = noisy_plane(12, 10, seed);
            for effect in sample_effects() {
                for interpolation in [Interpolation::Nearest, Interpolation::Bilinear, Interpolation::Bicubic] {
                    let result = effect.apply_with(plane.view(), interpolation).unwrap();
                    assert!(
                        result.iter().all(|v| (0.0..=1.0).contains(v)),
                        "{:?} produced values outside 0..1",
                        effect.kind()
                    );
                }
            }
        }
    }

    #[test]
    fn test_defaults_run_on_every_kind() {
        let settings = EffectSettings::default();
        let plane = noisy_plane(6, 6, 7);

        for kind in EffectKind::ALL {
            let effect = settings.effect(kind);
            assert_eq!(effect.kind(), kind);
            assert!(effect.apply(plane.view()).is_ok());
        }
    }

    #[test]
    fn test_default_values() {
        let settings = EffectSettings::default();

        assert_eq!(settings.fisheye.sigma, 1.0);
        assert_eq!(settings.swirl.sigma, 0.01);
        assert_eq!(settings.waves.frequency, 0.1);
        assert_eq!(settings.square_eye.p, 0.1);
        assert_eq!(settings.median.size, 3.0);
        assert_eq!(settings.gaussian.radius, 2.0);
        assert_eq!(settings.mean.size, 3.0);
    }

    #[test]
    fn test_settings_set_and_snapshot() {
        let mut settings = EffectSettings::default();
        settings.set(Effect::Mean(MeanParams { size: 9.0 }));

        let snapshot = settings.effect(EffectKind::Mean);
        settings.mean.size = 1.0;

        assert_eq!(snapshot, Effect::Mean(MeanParams { size: 9.0 }));
        assert_eq!(settings.mean.size, 1.0);
    }

    #[test]
    fn test_invalid_parameters() {
        let plane = noisy_plane(4, 4, 1);

        let waves = Effect::Waves(WavesParams {
            frequency: 0.0,
            ..WavesParams::default()
        });
        let square = Effect::SquareEye(SquareEyeParams {
            p: -1.0,
            ..SquareEyeParams::default()
        });
        let fisheye = Effect::FishEye(FishEyeParams {
            center_x: f32::NAN,
            ..FishEyeParams::default()
        });

        let gaussian = Effect::Gaussian(GaussianParams { radius: f32::INFINITY });
        let median = Effect::Median(MedianParams { size: f32::INFINITY });
        let mean = Effect::Mean(MeanParams { size: f32::NAN });

        for effect in [waves, square, fisheye, gaussian, median, mean] {
            assert!(matches!(
                effect.apply(plane.view()),
                Err(TransformError::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn test_huge_blur_radius_runs() {
        let plane = noisy_plane(3, 3, 5);

        for effect in [
            Effect::Gaussian(GaussianParams { radius: 1e9 }),
            Effect::RadialBlur(RadialBlurParams { sigma: 1e9 }),
            Effect::Median(MedianParams { size: 1e30 }),
        ] {
            let result = effect.apply(plane.view()).unwrap();
            assert_eq!(result.dim(), (3, 3));
            assert!(result.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_filters_passthrough_on_nonpositive() {
        let plane = noisy_plane(5, 7, 3);

        for effect in [
            Effect::Median(MedianParams { size: 0.0 }),
            Effect::Gaussian(GaussianParams { radius: 0.0 }),
            Effect::Mean(MeanParams { size: -1.0 }),
        ] {
            assert_eq!(effect.apply(plane.view()).unwrap(), plane);
        }
    }

    #[test]
    fn test_falloff_weights() {
        assert_eq!(Falloff::Linear.weight(0.0, 2.0), 1.0);
        assert_eq!(Falloff::Linear.weight(1.0, 2.0), 0.5);
        assert_eq!(Falloff::Linear.weight(3.0, 2.0), 0.0);
        assert_eq!(Falloff::Gaussian.weight(0.0, 2.0), 1.0);
        assert!(Falloff::Gaussian.weight(2.0, 2.0) < 1.0);
    }

    #[test]
    fn test_falloff_from_name() {
        assert_eq!(Falloff::from_name("Gaussian"), Some(Falloff::Gaussian));
        assert_eq!(Falloff::from_name("linear"), Some(Falloff::Linear));
        assert_eq!(Falloff::from_name("cosine"), None);
    }

    #[test]
    fn test_fn_transform() {
        let invert = FnTransform::new("invert", |plane| Ok(plane.mapv(|v| 1.0 - v)));
        let plane = Array2::<f32>::from_elem((2, 2), 0.25);

        assert_eq!(invert.name(), "invert");
        assert_eq!(invert.apply(plane.view()).unwrap()[[1, 1]], 0.75);
    }

    #[test]
    fn test_apply_to_image_keeps_channels() {
        let data = Array3::from_shape_fn((6, 6, 3), |(y, x, c)| ((y + x + c) % 4) as f32 / 3.0);
        let image = Image::new(data).unwrap();
        let effect = Effect::Gaussian(GaussianParams { radius: 1.0 });

        let result = apply_to_image(&effect, &image).unwrap();

        assert_eq!(result.dim(), (6, 6, 3));
        for c in 0..3 {
            let expected = effect.apply(image.channel(c)).unwrap();
            assert_eq!(result.channel(c), expected);
        }
    }
}
