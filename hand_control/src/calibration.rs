//! Per-session pinch range, captured before any gesture control.
//!
//! Nothing here is persisted; a new session (or `reset`) starts over.

use thiserror::Error;
use tracing::{debug, info};

use crate::gesture::{CalibrationStep, Measurements};

/// Palm sizes at or below this are treated as "not measured".
pub const PALM_EPSILON: f32 = 1e-6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("calibration range needs max > min (min {min}, max {max})")]
    InvalidRange { min: f32, max: f32 },

    #[error("reference palm size {0} is too small")]
    DegeneratePalm(f32),

    #[error("non-finite calibration value for {0}")]
    NonFinite(&'static str),

    #[error("calibration incomplete: {missing} not recorded")]
    Incomplete { missing: &'static str },
}

pub type Result<T> = std::result::Result<T, CalibrationError>;

// ════════════════════════════════════════════════════════════════════════════
// CalibrationRange
// ════════════════════════════════════════════════════════════════════════════

/// A complete, valid calibration.  Can only be built with
/// `max_distance > min_distance` and a usable palm size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationRange {
    min_distance:        f32,
    max_distance:        f32,
    reference_palm_size: f32,
}

impl CalibrationRange {
    pub fn new(min_distance: f32, max_distance: f32, reference_palm_size: f32) -> Result<Self> {
        for (name, v) in [
            ("min_distance", min_distance),
            ("max_distance", max_distance),
            ("reference_palm_size", reference_palm_size),
        ] {
            if !v.is_finite() {
                return Err(CalibrationError::NonFinite(name));
            }
        }
        if max_distance <= min_distance {
            return Err(CalibrationError::InvalidRange { min: min_distance, max: max_distance });
        }
        if reference_palm_size <= PALM_EPSILON {
            return Err(CalibrationError::DegeneratePalm(reference_palm_size));
        }
        Ok(CalibrationRange { min_distance, max_distance, reference_palm_size })
    }

    pub fn min_distance(&self) -> f32 { self.min_distance }
    pub fn max_distance(&self) -> f32 { self.max_distance }
    pub fn reference_palm_size(&self) -> f32 { self.reference_palm_size }
}

// ════════════════════════════════════════════════════════════════════════════
// CalibrationStore
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, Default)]
pub struct CalibrationStore {
    min_distance: Option<f32>,
    max_distance: Option<f32>,
    palm_size:    Option<f32>,
}

impl CalibrationStore {
    pub fn new() -> Self { Self::default() }

    /// Closed pinch plus the palm size every later measurement is scaled by.
    pub fn record_min(&mut self, pinch: f32, palm: f32) {
        debug!(pinch, palm, "calibration: min");
        self.min_distance = Some(pinch);
        self.palm_size    = Some(palm);
    }

    pub fn record_max(&mut self, pinch: f32) {
        debug!(pinch, "calibration: max");
        self.max_distance = Some(pinch);
    }

    /// The range recorded so far, if it is complete and valid.
    pub fn range(&self) -> Result<CalibrationRange> {
        let min  = self.min_distance.ok_or(CalibrationError::Incomplete { missing: "min_distance" })?;
        let max  = self.max_distance.ok_or(CalibrationError::Incomplete { missing: "max_distance" })?;
        let palm = self.palm_size.ok_or(CalibrationError::Incomplete { missing: "reference_palm_size" })?;
        CalibrationRange::new(min, max, palm)
    }

    pub fn is_complete(&self) -> bool { self.range().is_ok() }

    /// Apply one calibration command.  Returns the finished range on a
    /// successful `Done`; an incomplete range on `Done` is an error and the
    /// recorded values are kept so calibration can continue.
    pub fn step(&mut self, step: CalibrationStep, right: &Measurements) -> Result<Option<CalibrationRange>> {
        match step {
            CalibrationStep::Min  => self.record_min(right.pinch, right.palm),
            CalibrationStep::Max  => self.record_max(right.pinch),
            CalibrationStep::Done => {
                let range = self.range()?;
                info!(
                    min  = range.min_distance,
                    max  = range.max_distance,
                    palm = range.reference_palm_size,
                    "calibration complete"
                );
                return Ok(Some(range));
            }
        }
        Ok(None)
    }

    /// Forget everything recorded.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn min_distance(&self) -> Option<f32> { self.min_distance }
    pub fn max_distance(&self) -> Option<f32> { self.max_distance }
    pub fn palm_size(&self) -> Option<f32> { self.palm_size }
}
