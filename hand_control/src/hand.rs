//! Per-hand geometry as delivered by an external landmark detector.
//!
//! Coordinates are image pixels: x grows to the right, y grows downward.

use serde::{Deserialize, Serialize};

// Landmark indices in the 21-point hand model.
pub const WRIST:          usize = 0;
pub const THUMB_TIP:      usize = 4;
pub const INDEX_MCP:      usize = 5;
pub const INDEX_TIP:      usize = 8;
pub const MIDDLE_TIP:     usize = 12;
pub const LANDMARK_COUNT: usize = 21;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self { Point { x, y } }

    pub fn distance(self, other: Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// FingerPattern
// ════════════════════════════════════════════════════════════════════════════

/// Which fingers are extended, thumb first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FingerPattern(pub [bool; 5]);

impl FingerPattern {
    /// `[thumb, index, middle, ring, pinky]`, 1 = extended.
    pub const fn of(bits: [u8; 5]) -> Self {
        FingerPattern([bits[0] != 0, bits[1] != 0, bits[2] != 0, bits[3] != 0, bits[4] != 0])
    }
}

impl std::fmt::Display for FingerPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &up in &self.0 {
            f.write_str(if up { "1" } else { "0" })?;
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HandFrame
// ════════════════════════════════════════════════════════════════════════════

/// One detected hand in one camera frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HandFrame {
    pub center:    Point,
    pub landmarks: Vec<Point>,
    pub fingers:   FingerPattern,
}

impl HandFrame {
    pub fn landmark(&self, index: usize) -> Option<Point> {
        self.landmarks.get(index).copied()
    }

    /// Thumb tip to index tip.
    pub fn pinch_distance(&self) -> Option<f32> {
        Some(self.landmark(INDEX_TIP)?.distance(self.landmark(THUMB_TIP)?))
    }

    /// Wrist to index knuckle; tracks how close the hand is to the camera.
    pub fn palm_size(&self) -> Option<f32> {
        Some(self.landmark(WRIST)?.distance(self.landmark(INDEX_MCP)?))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Left/right assignment
// ════════════════════════════════════════════════════════════════════════════

/// How the frames reaching the classifier relate to the user's view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraView {
    /// Unflipped camera image: the user's right hand appears on the left,
    /// so the hand with the smaller x is the right hand.
    #[default]
    Raw,
    /// Selfie-style image: the hand with the smaller x is the left hand.
    Mirrored,
}

/// The two hands of one frame, assigned to the user's left and right.
#[derive(Clone, Copy, Debug)]
pub struct HandPair<'a> {
    /// Selects the control.
    pub left:  &'a HandFrame,
    /// Supplies the measurement.
    pub right: &'a HandFrame,
}

impl<'a> HandPair<'a> {
    /// `None` unless exactly two hands were detected.
    pub fn split(hands: &'a [HandFrame], view: CameraView) -> Option<Self> {
        let [a, b] = hands else { return None };
        let (smaller_x, larger_x) = if a.center.x < b.center.x { (a, b) } else { (b, a) };
        Some(match view {
            CameraView::Raw      => HandPair { left: larger_x, right: smaller_x },
            CameraView::Mirrored => HandPair { left: smaller_x, right: larger_x },
        })
    }
}
