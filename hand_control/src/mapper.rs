//! Calibrated right-hand geometry → control values.

use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationRange, PALM_EPSILON};
use crate::hand::Point;

/// Raw slider scale produced by [`ParameterMapper::map_gain`].
pub const RAW_MIN: f32 = 0.0;
pub const RAW_MAX: f32 = 100.0;

/// Band gain at raw 0 and the dB span up to raw 100.
pub const GAIN_DB_MIN:  f32 = -20.0;
pub const GAIN_DB_SPAN: f32 = 30.0;

/// Clamp a raw slider value into `[0, 100]` and map it to
/// `[-20, +10]` dB.
pub fn gain_to_db(raw: f32) -> f32 {
    GAIN_DB_MIN + raw.clamp(RAW_MIN, RAW_MAX) / (RAW_MAX - RAW_MIN) * GAIN_DB_SPAN
}

// ════════════════════════════════════════════════════════════════════════════
// VolumeDial
// ════════════════════════════════════════════════════════════════════════════

/// Wrist → middle-fingertip angle as a volume knob.  The hand tilted
/// `baseline_deg` above horizontal is half volume; `±span_deg` from there
/// reaches the ends.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeDial {
    pub baseline_deg: f32,
    pub span_deg:     f32,
}

impl Default for VolumeDial {
    fn default() -> Self {
        VolumeDial { baseline_deg: 60.0, span_deg: 50.0 }
    }
}

impl VolumeDial {
    /// Volume in `[0, 1]`.  Image y grows downward, hence the negation.
    pub fn volume(&self, wrist: Point, middle_tip: Point) -> f32 {
        let dx = middle_tip.x - wrist.x;
        let dy = middle_tip.y - wrist.y;
        let angle = -dy.atan2(dx).to_degrees() - self.baseline_deg;
        let span = self.span_deg.abs().max(f32::EPSILON);
        (angle.clamp(-span, span) + span) / (2.0 * span)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ParameterMapper
// ════════════════════════════════════════════════════════════════════════════

/// Exists only once calibration is complete.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParameterMapper {
    range: CalibrationRange,
    dial:  VolumeDial,
}

impl ParameterMapper {
    pub fn new(range: CalibrationRange, dial: VolumeDial) -> Self {
        ParameterMapper { range, dial }
    }

    /// Pinch distance → raw gain on the `[0, 100]` scale, compensating for
    /// the hand's distance from the camera via the palm size.  Not clamped:
    /// a pinch outside the calibrated range extrapolates.  `None` when the
    /// palm was not measurable or the result is not finite.
    pub fn map_gain(&self, pinch: f32, palm: f32) -> Option<f32> {
        if !palm.is_finite() || palm <= PALM_EPSILON || !pinch.is_finite() {
            return None;
        }
        let scale = palm / self.range.reference_palm_size();
        let lo = self.range.min_distance() * scale;
        let hi = self.range.max_distance() * scale;
        if hi - lo <= f32::EPSILON {
            return None;
        }
        let raw = RAW_MIN + (pinch - lo) * (RAW_MAX - RAW_MIN) / (hi - lo);
        raw.is_finite().then_some(raw)
    }

    pub fn map_volume(&self, wrist: Point, middle_tip: Point) -> f32 {
        self.dial.volume(wrist, middle_tip)
    }

    pub fn range(&self) -> &CalibrationRange { &self.range }
}
