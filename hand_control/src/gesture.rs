//! Finger pattern → control symbol, one frame at a time.
//!
//! The left hand's pattern selects what to adjust; the right hand supplies
//! the continuous measurement.  Both vocabularies are fixed tables.

use tracing::trace;

use crate::hand::{CameraView, FingerPattern, HandFrame, HandPair, Point, MIDDLE_TIP, WRIST};

// ════════════════════════════════════════════════════════════════════════════
// Gesture
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gesture {
    Bass,
    Mid,
    Treble,
    /// Master volume.
    All,
    /// Flip adjustment mode.
    Toggle,
    None,
}

pub const GESTURE_TABLE: [(FingerPattern, Gesture); 5] = [
    (FingerPattern::of([0, 0, 0, 0, 0]), Gesture::Bass),
    (FingerPattern::of([0, 1, 0, 0, 0]), Gesture::Mid),
    (FingerPattern::of([0, 0, 0, 0, 1]), Gesture::Treble),
    (FingerPattern::of([1, 1, 1, 1, 1]), Gesture::All),
    (FingerPattern::of([1, 1, 0, 0, 1]), Gesture::Toggle),
];

impl Gesture {
    pub fn from_pattern(pattern: FingerPattern) -> Gesture {
        GESTURE_TABLE
            .iter()
            .find(|(p, _)| *p == pattern)
            .map_or(Gesture::None, |&(_, g)| g)
    }

    pub fn label(self) -> &'static str {
        match self {
            Gesture::Bass   => "bass",
            Gesture::Mid    => "mid",
            Gesture::Treble => "treble",
            Gesture::All    => "all",
            Gesture::Toggle => "toggle",
            Gesture::None   => "none",
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CalibrationStep
// ════════════════════════════════════════════════════════════════════════════

/// Left-hand commands understood while calibrating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CalibrationStep {
    /// Record the closed pinch and the reference palm size.
    Min,
    /// Record the open pinch.
    Max,
    Done,
}

pub const CALIBRATION_TABLE: [(FingerPattern, CalibrationStep); 3] = [
    (FingerPattern::of([1, 0, 0, 0, 0]), CalibrationStep::Min),
    (FingerPattern::of([1, 1, 1, 1, 1]), CalibrationStep::Max),
    (FingerPattern::of([0, 0, 0, 0, 0]), CalibrationStep::Done),
];

impl CalibrationStep {
    pub fn from_pattern(pattern: FingerPattern) -> Option<CalibrationStep> {
        CALIBRATION_TABLE.iter().find(|(p, _)| *p == pattern).map(|&(_, s)| s)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Reading
// ════════════════════════════════════════════════════════════════════════════

/// Right-hand geometry for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurements {
    pub pinch:      f32,
    pub palm:       f32,
    pub wrist:      Point,
    pub middle_tip: Point,
}

impl Measurements {
    /// `None` if the hand lacks any of the landmarks used.
    pub fn of(hand: &HandFrame) -> Option<Self> {
        Some(Measurements {
            pinch:      hand.pinch_distance()?,
            palm:       hand.palm_size()?,
            wrist:      hand.landmark(WRIST)?,
            middle_tip: hand.landmark(MIDDLE_TIP)?,
        })
    }
}

/// Both hands seen and measured.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PairReading {
    pub left:  FingerPattern,
    pub right: Measurements,
}

/// Classifier output for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    pub gesture: Gesture,
    /// `None` when the frame did not hold two usable hands.
    pub hands:   Option<PairReading>,
}

impl Reading {
    pub const NOTHING: Reading = Reading { gesture: Gesture::None, hands: None };
}

// ════════════════════════════════════════════════════════════════════════════
// GestureClassifier
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, Default)]
pub struct GestureClassifier {
    view: CameraView,
}

impl GestureClassifier {
    pub fn new(view: CameraView) -> Self { GestureClassifier { view } }

    pub fn view(&self) -> CameraView { self.view }

    /// Anything other than two hands (or a right hand missing landmarks) is
    /// "nothing to do", not an error.
    pub fn classify(&self, hands: &[HandFrame]) -> Reading {
        let Some(pair) = HandPair::split(hands, self.view) else {
            return Reading::NOTHING;
        };
        let Some(right) = Measurements::of(pair.right) else {
            trace!(landmarks = pair.right.landmarks.len(), "right hand incomplete");
            return Reading::NOTHING;
        };
        let left = pair.left.fingers;
        Reading {
            gesture: Gesture::from_pattern(left),
            hands:   Some(PairReading { left, right }),
        }
    }
}
