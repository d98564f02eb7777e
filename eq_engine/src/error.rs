//! Error types for filter design and parameter updates.

use thiserror::Error;

/// Rejected engine configuration.  Every operation that returns one of
/// these leaves the previous configuration in effect.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Filter order outside `1..=MAX_ORDER`.
    #[error("filter order {0} out of range (1..={max})", max = crate::sos::MAX_ORDER)]
    InvalidOrder(usize),

    /// Sample rate must be finite and positive.
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    /// A frequency, gain or time value was NaN or infinite.
    #[error("non-finite value for {0}")]
    NonFinite(&'static str),

    /// Mid band collapsed or inverted after clamping to `(0, fs/2)`.
    #[error("invalid mid band: low edge {low:.1} Hz >= high edge {high:.1} Hz")]
    InvalidBandEdges { low: f64, high: f64 },

    /// Limiter threshold that maps to a non-positive linear level.
    #[error("invalid limiter threshold: {0} dB")]
    InvalidThreshold(f32),

    /// Order and sample rate are fixed once an engine is built.
    #[error("filter order is fixed at {fixed}, cannot change to {requested}")]
    OrderChanged { fixed: usize, requested: usize },

    /// Attack or release time that is not strictly positive.
    #[error("invalid limiter time constant for {name}: {value} ms")]
    InvalidTimeConstant { name: &'static str, value: f32 },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
