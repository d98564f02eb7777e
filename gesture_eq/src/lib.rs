//! # gesture_eq
//!
//! Two-hand gesture control for a real-time three-band equalizer, with a
//! keyboard hand simulator and a minifb status window.
//!
//! ## Gestures
//!
//! The left hand picks the control, the right hand sets its value.
//!
//! | Left hand | Right hand | Effect (adjustment mode on) |
//! |---|---|---|
//! | fist | pinch | bass gain, -20..+10 dB |
//! | index | pinch | mid gain |
//! | pinky | pinch | treble gain |
//! | open | tilt | master volume |
//! | thumb + index + pinky | | toggle adjustment mode |
//!
//! Before any of that, calibration: thumb (closed pinch), open hand (open
//! pinch), fist (done).
//!
//! ## Simulation keyboard shortcuts
//!
//! | Key | Simulated pose |
//! |---|---|
//! | `1`..`4` | left hand: fist / index / pinky / open |
//! | `5` | left hand: thumb |
//! | `T` (hold) | left hand: toggle |
//! | `Up` / `Down` | right-hand pinch wider / narrower |
//! | `Left` / `Right` | right-hand tilt up / down |
//! | `W` / `S` | hand closer / farther |
//! | `H` | hide / show hands |
//! | `R` | recalibrate |
//! | `Q`, `Esc` | quit |

pub mod config;
pub mod control;
pub mod tracker;
pub mod player;
pub mod visualizer;
pub mod wav;
pub mod app;
