//! # hand_control
//!
//! Turns two detected hands per camera frame into equalizer control values.
//!
//! ```text
//! [HandFrame; 2] ─ GestureClassifier ─┬─ CalibrationStore   (until Done)
//!                                     └─ ModeController ─ ParameterMapper ─ gain / volume
//! ```
//!
//! ## Left hand: what to adjust
//!
//! | Pattern (thumb→pinky) | Gesture | Calibrating |
//! |---|---|---|
//! | `00000` | Bass   | Done |
//! | `01000` | Mid    | |
//! | `00001` | Treble | |
//! | `11111` | All (volume) | Max |
//! | `11001` | Toggle adjustment mode | |
//! | `10000` | | Min |
//!
//! ## Right hand: how much
//!
//! Thumb–index pinch distance, scaled by palm size, for band gains; the
//! wrist → middle-fingertip angle for volume.

pub mod hand;
pub mod gesture;
pub mod calibration;
pub mod mapper;
pub mod mode;

pub use calibration::{CalibrationError, CalibrationRange, CalibrationStore};
pub use gesture::{CalibrationStep, Gesture, GestureClassifier, Measurements, PairReading, Reading};
pub use hand::{CameraView, FingerPattern, HandFrame, HandPair, Point};
pub use mapper::{gain_to_db, ParameterMapper, VolumeDial};
pub use mode::ModeController;
