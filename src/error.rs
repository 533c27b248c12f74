//! Error type shared by the effect library, the channel joiner and the worker.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// A parameter value the effect cannot work with (non-finite, zero
    /// frequency, non-positive norm exponent, ...).
    #[error("invalid {effect} parameter `{name}`: {reason}")]
    InvalidParameter {
        effect: &'static str,
        name: &'static str,
        reason: String,
    },

    /// Channel planes handed to the joiner do not share one shape.
    #[error("channel {index} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("unsupported image layout: {0}")]
    InvalidImage(String),

    /// A transform returned an error or panicked while executing.
    #[error("{effect} failed on {scope}: {message}")]
    ExecutionFailure {
        effect: String,
        scope: String,
        message: String,
    },

    #[error("failed to start transform worker: {0}")]
    Startup(String),

    #[error("no preview available to apply")]
    NoPreview,
}

impl TransformError {
    pub(crate) fn invalid(effect: &'static str, name: &'static str, reason: impl Into<String>) -> Self {
        TransformError::InvalidParameter {
            effect,
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;
