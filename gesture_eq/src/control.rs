//! Per-frame orchestration: hands in, published EQ settings out.
//!
//! ```text
//!   Calibrating ── Done with a complete range ──▶ Running
//!        ▲                                           │
//!        └──────────────── recalibrate() ────────────┘
//! ```
//!
//! While running, the mode toggle gates everything: band gestures move one
//! band's gain, `All` moves the master volume, and nothing else writes.

use std::sync::Arc;

use eq_engine::{EngineError, SharedSettings};
use hand_control::{
    gain_to_db, CalibrationStep, CalibrationStore, Gesture, GestureClassifier, HandFrame,
    ModeController, ParameterMapper, VolumeDial,
};
use tracing::{debug, info, warn};

use crate::config::AppConfig;

// ════════════════════════════════════════════════════════════════════════════
// Phase / FrameReport
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub enum Phase {
    Calibrating(CalibrationStore),
    Running(ParameterMapper),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Band { Low, Mid, High }

impl Band {
    fn of(gesture: Gesture) -> Option<Band> {
        match gesture {
            Gesture::Bass   => Some(Band::Low),
            Gesture::Mid    => Some(Band::Mid),
            Gesture::Treble => Some(Band::High),
            _               => None,
        }
    }
}

/// What one frame changed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Applied {
    Gain { band: Band, db: f32 },
    Volume(f32),
    Calibration(CalibrationStep),
    CalibrationDone,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReport {
    pub gesture:     Gesture,
    /// Two usable hands were seen.
    pub tracked:     bool,
    pub calibrating: bool,
    pub active:      bool,
    pub applied:     Option<Applied>,
}

// ════════════════════════════════════════════════════════════════════════════
// ControlLoop
// ════════════════════════════════════════════════════════════════════════════

pub struct ControlLoop {
    classifier: GestureClassifier,
    mode:       ModeController,
    phase:      Phase,
    dial:       VolumeDial,
    shared:     Arc<SharedSettings>,
}

impl ControlLoop {
    pub fn new(cfg: &AppConfig, shared: Arc<SharedSettings>) -> Self {
        ControlLoop {
            classifier: GestureClassifier::new(cfg.gesture.camera_view),
            mode:       ModeController::new(cfg.gesture.cooldown_frames),
            phase:      Phase::Calibrating(CalibrationStore::new()),
            dial:       cfg.gesture.volume,
            shared,
        }
    }

    /// Process one camera frame's hands.
    pub fn on_frame(&mut self, hands: &[HandFrame]) -> FrameReport {
        let reading = self.classifier.classify(hands);
        let mut report = FrameReport {
            gesture:     reading.gesture,
            tracked:     reading.hands.is_some(),
            calibrating: self.is_calibrating(),
            active:      self.mode.is_active(),
            applied:     None,
        };
        let Some(pair) = reading.hands else { return report };

        match &mut self.phase {
            Phase::Calibrating(store) => {
                let Some(step) = CalibrationStep::from_pattern(pair.left) else { return report };
                match store.step(step, &pair.right) {
                    Ok(Some(range)) => {
                        self.phase = Phase::Running(ParameterMapper::new(range, self.dial));
                        self.mode.reset();
                        report.calibrating = false;
                        report.active      = false;
                        report.applied     = Some(Applied::CalibrationDone);
                    }
                    Ok(None) => report.applied = Some(Applied::Calibration(step)),
                    Err(e)   => debug!(error = %e, "calibration not finished"),
                }
            }
            Phase::Running(mapper) => {
                let active = self.mode.step(reading.gesture);
                report.active = active;
                if !active {
                    return report;
                }
                let result = if let Some(band) = Band::of(reading.gesture) {
                    match mapper.map_gain(pair.right.pinch, pair.right.palm) {
                        Some(raw) => {
                            let db = gain_to_db(raw);
                            report.applied = Some(Applied::Gain { band, db });
                            set_band_gain(&self.shared, band, db)
                        }
                        None => Ok(()),
                    }
                } else if reading.gesture == Gesture::All {
                    let volume = mapper.map_volume(pair.right.wrist, pair.right.middle_tip);
                    report.applied = Some(Applied::Volume(volume));
                    self.shared.set_volume(volume)
                } else {
                    Ok(())
                };
                if let Err(e) = result {
                    warn!(error = %e, "gesture update rejected");
                    report.applied = None;
                }
            }
        }
        report
    }

    /// Discard the calibration and start over.
    pub fn recalibrate(&mut self) {
        info!("recalibrating");
        self.phase = Phase::Calibrating(CalibrationStore::new());
        self.mode.reset();
    }

    // ── frequency control surface ─────────────────────────────────────────

    pub fn set_low_cut(&self, hz: f64) -> Result<(), EngineError> {
        self.shared.set_low_cut(hz)
    }

    pub fn set_high_cut(&self, hz: f64) -> Result<(), EngineError> {
        self.shared.set_high_cut(hz)
    }

    pub fn set_mid_band(&self, center: Option<f64>, bandwidth: Option<f64>) -> Result<(), EngineError> {
        self.shared.set_mid_band(center, bandwidth)
    }

    // ── accessors ─────────────────────────────────────────────────────────

    pub fn phase(&self) -> &Phase { &self.phase }
    pub fn is_calibrating(&self) -> bool { matches!(self.phase, Phase::Calibrating(_)) }
    pub fn mode_active(&self) -> bool { self.mode.is_active() }
    pub fn shared(&self) -> &Arc<SharedSettings> { &self.shared }
}

fn set_band_gain(shared: &SharedSettings, band: Band, db: f32) -> Result<(), EngineError> {
    match band {
        Band::Low  => shared.set_gain(Some(db), None, None),
        Band::Mid  => shared.set_gain(None, Some(db), None),
        Band::High => shared.set_gain(None, None, Some(db)),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use eq_engine::EqSettings;
    use hand_control::hand::{FingerPattern, Point, INDEX_MCP, INDEX_TIP, LANDMARK_COUNT, MIDDLE_TIP, THUMB_TIP};
    use proptest::prelude::*;

    const MIN:    [u8; 5] = [1, 0, 0, 0, 0];
    const MAX:    [u8; 5] = [1, 1, 1, 1, 1];
    const DONE:   [u8; 5] = [0, 0, 0, 0, 0];
    const BASS:   [u8; 5] = [0, 0, 0, 0, 0];
    const MID:    [u8; 5] = [0, 1, 0, 0, 0];
    const ALL:    [u8; 5] = [1, 1, 1, 1, 1];
    const TOGGLE: [u8; 5] = [1, 1, 0, 0, 1];
    const FIST_ISH: [u8; 5] = [0, 1, 1, 0, 0];

    fn hand(cx: f32, fingers: [u8; 5], pinch: f32, palm: f32) -> HandFrame {
        let wrist = Point::new(cx, 400.0);
        let mut landmarks = vec![wrist; LANDMARK_COUNT];
        landmarks[INDEX_MCP]  = Point::new(cx, 400.0 - palm);
        landmarks[THUMB_TIP]  = Point::new(cx, 200.0);
        landmarks[INDEX_TIP]  = Point::new(cx + pinch, 200.0);
        // Straight up: 90° → volume 0.8 with the default dial.
        landmarks[MIDDLE_TIP] = Point::new(cx, 250.0);
        HandFrame { center: wrist, landmarks, fingers: FingerPattern::of(fingers) }
    }

    /// Raw camera view: the right hand is the one with the smaller x.
    fn frame(left: [u8; 5], pinch: f32, palm: f32) -> Vec<HandFrame> {
        vec![hand(500.0, left, 0.0, 80.0), hand(120.0, [0; 5], pinch, palm)]
    }

    fn control() -> ControlLoop {
        let cfg = AppConfig::default();
        let shared = Arc::new(SharedSettings::new(44_100.0, EqSettings::default()).unwrap());
        ControlLoop::new(&cfg, shared)
    }

    fn calibrated() -> ControlLoop {
        let mut c = control();
        c.on_frame(&frame(MIN, 20.0, 80.0));
        c.on_frame(&frame(MAX, 120.0, 80.0));
        let r = c.on_frame(&frame(DONE, 0.0, 80.0));
        assert_eq!(r.applied, Some(Applied::CalibrationDone));
        c
    }

    fn activate(c: &mut ControlLoop) {
        assert!(c.on_frame(&frame(TOGGLE, 50.0, 80.0)).active);
        c.on_frame(&frame(FIST_ISH, 50.0, 80.0));
    }

    #[test]
    fn calibration_sequence() {
        let mut c = control();
        assert!(c.is_calibrating());
        assert_eq!(c.on_frame(&frame(MIN, 20.0, 80.0)).applied, Some(Applied::Calibration(CalibrationStep::Min)));
        // Done before max: still calibrating.
        assert_eq!(c.on_frame(&frame(DONE, 0.0, 80.0)).applied, None);
        assert!(c.is_calibrating());
        c.on_frame(&frame(MAX, 120.0, 80.0));
        c.on_frame(&frame(DONE, 0.0, 80.0));
        assert!(!c.is_calibrating());
    }

    #[test]
    fn nothing_happens_while_calibrating() {
        let mut c = control();
        let before = c.shared().settings();
        for _ in 0..5 {
            c.on_frame(&frame(TOGGLE, 100.0, 80.0));
            c.on_frame(&frame(MID, 100.0, 80.0));
        }
        assert!(!c.mode_active());
        assert_eq!(c.shared().settings(), before);
    }

    #[test]
    fn inactive_mode_ignores_band_gestures() {
        let mut c = calibrated();
        let before = c.shared().settings();
        c.on_frame(&frame(BASS, 100.0, 80.0));
        assert_eq!(c.shared().settings(), before);
    }

    #[test]
    fn band_gesture_sets_gain() {
        let mut c = calibrated();
        activate(&mut c);
        // Palm doubled: range [40, 240]; pinch 100 → raw 30 → -11 dB.
        let r = c.on_frame(&frame(MID, 100.0, 160.0));
        assert_eq!(r.applied, Some(Applied::Gain { band: Band::Mid, db: -11.0 }));
        let s = c.shared().settings();
        assert_eq!(s.gains.mid_db, -11.0);
        assert_eq!(s.gains.low_db, 0.0);
    }

    #[test]
    fn pinch_beyond_range_clamps_in_db() {
        let mut c = calibrated();
        activate(&mut c);
        c.on_frame(&frame(BASS, 500.0, 80.0));
        assert_eq!(c.shared().settings().gains.low_db, 10.0);
    }

    #[test]
    fn all_gesture_sets_volume() {
        let mut c = calibrated();
        activate(&mut c);
        let r = c.on_frame(&frame(ALL, 50.0, 80.0));
        let Some(Applied::Volume(v)) = r.applied else { panic!("{:?}", r) };
        assert!((v - 0.8).abs() < 1e-4);
        assert!((c.shared().settings().volume - 0.8).abs() < 1e-4);
    }

    #[test]
    fn one_hand_is_a_noop() {
        let mut c = calibrated();
        activate(&mut c);
        let before = c.shared().settings();
        let r = c.on_frame(&frame(MID, 100.0, 80.0)[1..]);
        assert!(!r.tracked);
        assert_eq!(r.applied, None);
        assert_eq!(c.shared().settings(), before);
    }

    #[test]
    fn degenerate_palm_is_a_noop() {
        let mut c = calibrated();
        activate(&mut c);
        let before = c.shared().settings();
        assert_eq!(c.on_frame(&frame(MID, 100.0, 0.0)).applied, None);
        assert_eq!(c.shared().settings(), before);
    }

    #[test]
    fn recalibrate_returns_to_calibrating() {
        let mut c = calibrated();
        activate(&mut c);
        c.recalibrate();
        assert!(c.is_calibrating());
        assert!(!c.mode_active());
    }

    #[test]
    fn frequency_surface_forwards() {
        let c = control();
        c.set_mid_band(Some(2000.0), Some(800.0)).unwrap();
        assert_eq!(c.shared().settings().edges.high_cut, 2400.0);
        assert!(c.set_low_cut(f64::NAN).is_err());
    }

    proptest! {
        #[test]
        fn gestures_keep_gains_in_slider_range(
            pinches in proptest::collection::vec((0.0f32..400.0, 1.0f32..300.0), 1..40),
        ) {
            let mut c = calibrated();
            activate(&mut c);
            for (pinch, palm) in pinches {
                c.on_frame(&frame(BASS, pinch, palm));
            }
            let g = c.shared().settings().gains;
            prop_assert!((-20.0..=10.0).contains(&g.low_db));
        }
    }
}
