//! ImageStag Warp
//!
//! Geometric distortions and blur filters for interactive image editing,
//! with a background worker that keeps the UI thread free while previews
//! are computed.
//!
//! ## Image Format
//! Images are `f32` arrays of shape (height, width, channels):
//! - **Grayscale**: (height, width, 1) - single channel
//! - **RGB**: (height, width, 3) - 3 color channels
//!
//! Samples are 0.0-1.0. Every effect works on one channel plane at a time,
//! so RGB images are processed as three independent planes.
//!
//! ## Architecture
//! - [`filters`] - pure per-channel effect functions
//! - [`effects`] - parameter records and the [`ChannelTransform`] seam
//! - [`worker`] - latest-wins mailbox, execution thread, channel fan-out
//! - [`editor`] - settings, preview tracking, apply/undo history
//!
//! Python bindings (feature `python`) and WASM bindings (feature `wasm`)
//! expose the effects as synchronous functions.

pub mod channels;
pub mod editor;
pub mod effects;
pub mod error;
pub mod filters;
pub mod history;
pub mod image;
pub mod worker;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use editor::Editor;
pub use effects::{apply_to_image, ChannelTransform, Effect, EffectKind, EffectSettings, Falloff, FnTransform};
pub use error::{Result, TransformError};
pub use filters::Interpolation;
pub use history::History;
pub use image::Image;
pub use worker::{TransformOutput, TransformRequest, TransformWorker, WorkerConfig};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
mod python {
    use numpy::{IntoPyArray, PyArray3, PyReadonlyArray3};
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;

    use crate::effects::{
        apply_to_image, CylinderParams, Effect, Falloff, FishEyeParams, GaussianParams, MeanParams,
        MedianParams, RadialBlurParams, SquareEyeParams, SwirlParams, WavesParams,
    };
    use crate::error::TransformError;
    use crate::image::Image;

    fn to_py_err(e: TransformError) -> PyErr {
        PyValueError::new_err(e.to_string())
    }

    fn parse_falloff(name: &str) -> PyResult<Falloff> {
        Falloff::from_name(name)
            .ok_or_else(|| PyValueError::new_err(format!("unknown falloff `{name}`, expected linear or gaussian")))
    }

    /// Validate the array, run the effect on every channel, hand back a new array.
    fn run<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
        effect: Effect,
    ) -> PyResult<Bound<'py, PyArray3<f32>>> {
        let input = Image::new(image.as_array().to_owned()).map_err(to_py_err)?;
        let result = py
            .allow_threads(|| apply_to_image(&effect, &input))
            .map_err(to_py_err)?;
        Ok(result.into_array().into_pyarray(py))
    }

    // ========================================================================
    // Distortions
    // ========================================================================

    /// Fisheye lens centered at (center_x, center_y) with radius `sigma`.
    ///
    /// Image is (H, W, 1) or (H, W, 3) f32, values 0.0-1.0.
    #[pyfunction]
    #[pyo3(signature = (image, center_x=0.0, center_y=0.0, sigma=1.0, falloff="linear"))]
    pub fn fisheye_f32<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
        center_x: f32,
        center_y: f32,
        sigma: f32,
        falloff: &str,
    ) -> PyResult<Bound<'py, PyArray3<f32>>> {
        let params = FishEyeParams {
            center_x,
            center_y,
            sigma,
            falloff: parse_falloff(falloff)?,
        };
        run(py, image, Effect::FishEye(params))
    }

    /// Fisheye variant measuring distance with the Lp norm of exponent `p`.
    #[pyfunction]
    #[pyo3(signature = (image, center_x=0.0, center_y=0.0, sigma=1.0, p=0.1, falloff="gaussian"))]
    pub fn square_eye_f32<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
        center_x: f32,
        center_y: f32,
        sigma: f32,
        p: f32,
        falloff: &str,
    ) -> PyResult<Bound<'py, PyArray3<f32>>> {
        let params = SquareEyeParams {
            center_x,
            center_y,
            sigma,
            p,
            falloff: parse_falloff(falloff)?,
        };
        run(py, image, Effect::SquareEye(params))
    }

    /// Twist around (center_x, center_y) by `magnitude` radians.
    #[pyfunction]
    #[pyo3(signature = (image, center_x=0.0, center_y=0.0, sigma=0.01, magnitude=0.0))]
    pub fn swirl_f32<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
        center_x: f32,
        center_y: f32,
        sigma: f32,
        magnitude: f32,
    ) -> PyResult<Bound<'py, PyArray3<f32>>> {
        let params = SwirlParams {
            center_x,
            center_y,
            sigma,
            magnitude,
        };
        run(py, image, Effect::Swirl(params))
    }

    /// Sine waves along both axes. The output grows by twice each amplitude.
    #[pyfunction]
    #[pyo3(signature = (image, amplitude_x=0.1, amplitude_y=0.1, frequency=0.1, phase_x=0.0, phase_y=0.0))]
    pub fn waves_f32<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
        amplitude_x: f32,
        amplitude_y: f32,
        frequency: f32,
        phase_x: f32,
        phase_y: f32,
    ) -> PyResult<Bound<'py, PyArray3<f32>>> {
        let params = WavesParams {
            amplitude_x,
            amplitude_y,
            frequency,
            phase_x,
            phase_y,
        };
        run(py, image, Effect::Waves(params))
    }

    /// Cylinder anamorphosis, rotated by `angle_shift` degrees.
    #[pyfunction]
    #[pyo3(signature = (image, angle_shift=0.0))]
    pub fn cylinder_f32<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
        angle_shift: f32,
    ) -> PyResult<Bound<'py, PyArray3<f32>>> {
        run(py, image, Effect::Cylinder(CylinderParams { angle_shift }))
    }

    // ========================================================================
    // Blur Filters
    // ========================================================================

    /// Rotational blur around the image center.
    #[pyfunction]
    #[pyo3(signature = (image, sigma=0.1))]
    pub fn radial_blur_f32<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
        sigma: f32,
    ) -> PyResult<Bound<'py, PyArray3<f32>>> {
        run(py, image, Effect::RadialBlur(RadialBlurParams { sigma }))
    }

    #[pyfunction]
    #[pyo3(signature = (image, radius=2.0))]
    pub fn gaussian_f32<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
        radius: f32,
    ) -> PyResult<Bound<'py, PyArray3<f32>>> {
        run(py, image, Effect::Gaussian(GaussianParams { radius }))
    }

    /// Box filter of width `size`.
    #[pyfunction]
    #[pyo3(signature = (image, size=3.0))]
    pub fn mean_f32<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
        size: f32,
    ) -> PyResult<Bound<'py, PyArray3<f32>>> {
        run(py, image, Effect::Mean(MeanParams { size }))
    }

    // ========================================================================
    // Noise Filters
    // ========================================================================

    /// Median filter, window forced to an odd size.
    #[pyfunction]
    #[pyo3(signature = (image, size=3.0))]
    pub fn median_f32<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
        size: f32,
    ) -> PyResult<Bound<'py, PyArray3<f32>>> {
        run(py, image, Effect::Median(MedianParams { size }))
    }

    /// ImageStag Warp extension module
    #[pymodule]
    pub fn imagestag_warp(m: &Bound<'_, PyModule>) -> PyResult<()> {
        // Distortions
        m.add_function(wrap_pyfunction!(fisheye_f32, m)?)?;
        m.add_function(wrap_pyfunction!(square_eye_f32, m)?)?;
        m.add_function(wrap_pyfunction!(swirl_f32, m)?)?;
        m.add_function(wrap_pyfunction!(waves_f32, m)?)?;
        m.add_function(wrap_pyfunction!(cylinder_f32, m)?)?;

        // Blur filters
        m.add_function(wrap_pyfunction!(radial_blur_f32, m)?)?;
        m.add_function(wrap_pyfunction!(gaussian_f32, m)?)?;
        m.add_function(wrap_pyfunction!(mean_f32, m)?)?;

        // Noise filters
        m.add_function(wrap_pyfunction!(median_f32, m)?)?;

        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python::imagestag_warp;
