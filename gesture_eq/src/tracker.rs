//! Hand sources: anything that delivers detected hands, frame by frame.
//!
//! The public interface is [`TrackerEvent`] delivered over a `mpsc` channel.
//! A camera-backed landmark detector plugs in by implementing
//! [`HandSource`]; the shipped [`SimHandSource`] synthesises both hands from
//! keyboard input so the whole control path runs without a camera.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use hand_control::hand::{INDEX_MCP, INDEX_TIP, LANDMARK_COUNT, MIDDLE_TIP, THUMB_TIP, WRIST};
use hand_control::{CameraView, FingerPattern, HandFrame, Point};

// ════════════════════════════════════════════════════════════════════════════
// TrackerEvent
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub enum TrackerEvent {
    /// The hands detected in one frame (zero, one or two).
    Hands(Vec<HandFrame>),
    /// Throw away the calibration and start it again.
    Recalibrate,
    Quit,
}

// ════════════════════════════════════════════════════════════════════════════
// HandSource trait
// ════════════════════════════════════════════════════════════════════════════

pub trait HandSource: Send + 'static {
    fn run(self: Box<Self>, tx: Sender<TrackerEvent>);
}

/// Spawn a hand source on its own thread and return the receiving end.
pub fn spawn_hand_source<H: HandSource>(source: H) -> Receiver<TrackerEvent> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || Box::new(source).run(tx));
    rx
}

// ════════════════════════════════════════════════════════════════════════════
// Simulation input
// ════════════════════════════════════════════════════════════════════════════

/// Raw input event from the status window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimInput {
    KeyDown(SimKey),
    KeyUp(SimKey),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimKey {
    Bass,           // 1
    Mid,            // 2
    Treble,         // 3
    All,            // 4
    Thumb,          // 5   (calibration "min")
    Toggle,         // T   (held)
    PinchOpen,      // Up
    PinchClose,     // Down
    TiltUp,         // Left
    TiltDown,       // Right
    Closer,         // W
    Farther,        // S
    HideHands,      // H
    Recalibrate,    // R
    Quit,           // Q
}

const PINCH_STEP: f32 = 4.0;
const PINCH_RANGE: (f32, f32) = (4.0, 240.0);
const TILT_STEP: f32 = 3.0;
const PALM_STEP: f32 = 4.0;
const PALM_RANGE: (f32, f32) = (30.0, 200.0);
/// Wrist → middle fingertip length of the synthetic right hand.
const FINGER_LEN: f32 = 150.0;
/// Neither a gesture nor a calibration command.
const RELAXED: FingerPattern = FingerPattern::of([0, 1, 1, 0, 0]);
const TOGGLE: FingerPattern = FingerPattern::of([1, 1, 0, 0, 1]);

/// The synthetic pose of both hands.
#[derive(Clone, Debug, PartialEq)]
pub struct SimPose {
    pub left:        FingerPattern,
    pub toggle_held: bool,
    pub pinch:       f32,
    pub palm:        f32,
    /// Right-hand angle above horizontal, in degrees.
    pub tilt_deg:    f32,
    pub visible:     bool,
}

impl Default for SimPose {
    fn default() -> Self {
        SimPose {
            left:        RELAXED,
            toggle_held: false,
            pinch:       60.0,
            palm:        80.0,
            tilt_deg:    60.0,
            visible:     true,
        }
    }
}

/// Side effect of one input on the simulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimAction { None, Recalibrate, Quit }

impl SimPose {
    pub fn apply(&mut self, input: SimInput) -> SimAction {
        match input {
            SimInput::KeyDown(key) => match key {
                SimKey::Bass   => self.left = FingerPattern::of([0, 0, 0, 0, 0]),
                SimKey::Mid    => self.left = FingerPattern::of([0, 1, 0, 0, 0]),
                SimKey::Treble => self.left = FingerPattern::of([0, 0, 0, 0, 1]),
                SimKey::All    => self.left = FingerPattern::of([1, 1, 1, 1, 1]),
                SimKey::Thumb  => self.left = FingerPattern::of([1, 0, 0, 0, 0]),
                SimKey::Toggle => self.toggle_held = true,
                SimKey::PinchOpen  => self.pinch = (self.pinch + PINCH_STEP).min(PINCH_RANGE.1),
                SimKey::PinchClose => self.pinch = (self.pinch - PINCH_STEP).max(PINCH_RANGE.0),
                SimKey::TiltUp     => self.tilt_deg = (self.tilt_deg + TILT_STEP).min(180.0),
                SimKey::TiltDown   => self.tilt_deg = (self.tilt_deg - TILT_STEP).max(0.0),
                SimKey::Closer     => self.palm = (self.palm + PALM_STEP).min(PALM_RANGE.1),
                SimKey::Farther    => self.palm = (self.palm - PALM_STEP).max(PALM_RANGE.0),
                SimKey::HideHands  => self.visible = !self.visible,
                SimKey::Recalibrate => return SimAction::Recalibrate,
                SimKey::Quit        => return SimAction::Quit,
            },
            SimInput::KeyUp(SimKey::Toggle) => self.toggle_held = false,
            SimInput::KeyUp(_) => {}
        }
        SimAction::None
    }

    /// Both hands as a detector would report them.  The right hand is
    /// placed on the side `view` assigns to it.
    pub fn frames(&self, view: CameraView) -> Vec<HandFrame> {
        if !self.visible {
            return Vec::new();
        }
        let (right_x, left_x) = match view {
            CameraView::Raw      => (180.0, 460.0),
            CameraView::Mirrored => (460.0, 180.0),
        };
        let left = if self.toggle_held { TOGGLE } else { self.left };
        vec![self.right_hand(right_x), open_hand(left_x, left)]
    }

    fn right_hand(&self, cx: f32) -> HandFrame {
        let wrist = Point::new(cx, 420.0);
        let tilt = self.tilt_deg.to_radians();
        let mut landmarks = vec![wrist; LANDMARK_COUNT];
        landmarks[INDEX_MCP]  = Point::new(cx, wrist.y - self.palm);
        landmarks[THUMB_TIP]  = Point::new(cx - self.pinch / 2.0, wrist.y - self.palm * 1.5);
        landmarks[INDEX_TIP]  = Point::new(cx + self.pinch / 2.0, wrist.y - self.palm * 1.5);
        landmarks[MIDDLE_TIP] = Point::new(cx + tilt.cos() * FINGER_LEN, wrist.y - tilt.sin() * FINGER_LEN);
        HandFrame {
            center: Point::new(cx, wrist.y - self.palm / 2.0),
            landmarks,
            fingers: FingerPattern::of([1, 1, 1, 0, 0]),
        }
    }
}

fn open_hand(cx: f32, fingers: FingerPattern) -> HandFrame {
    let wrist = Point::new(cx, 420.0);
    let mut landmarks = vec![wrist; LANDMARK_COUNT];
    landmarks[WRIST]     = wrist;
    landmarks[INDEX_MCP] = Point::new(cx, 340.0);
    HandFrame { center: Point::new(cx, 380.0), landmarks, fingers }
}

// ════════════════════════════════════════════════════════════════════════════
// SimHandSource
// ════════════════════════════════════════════════════════════════════════════

/// Hand source driven by [`SimInput`] events from the window, emitting a
/// frame of both hands at a fixed rate.
pub struct SimHandSource {
    rx:     Receiver<SimInput>,
    pose:   SimPose,
    view:   CameraView,
    period: Duration,
}

impl SimHandSource {
    pub fn new(rx: Receiver<SimInput>, frame_rate: f32, view: CameraView) -> Self {
        SimHandSource {
            rx,
            pose:   SimPose::default(),
            view,
            period: Duration::from_secs_f32(1.0 / frame_rate.max(1.0)),
        }
    }
}

impl HandSource for SimHandSource {
    fn run(mut self: Box<Self>, tx: Sender<TrackerEvent>) {
        let mut next = Instant::now();
        loop {
            let wait = next.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(wait) {
                Ok(input) => {
                    let event = match self.pose.apply(input) {
                        SimAction::None        => continue,
                        SimAction::Recalibrate => TrackerEvent::Recalibrate,
                        SimAction::Quit        => {
                            let _ = tx.send(TrackerEvent::Quit);
                            return;
                        }
                    };
                    if tx.send(event).is_err() { return; }
                    continue;
                }
                Err(RecvTimeoutError::Timeout)      => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
            if tx.send(TrackerEvent::Hands(self.pose.frames(self.view))).is_err() {
                return;
            }
            next = (next + self.period).max(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hand_control::{Gesture, GestureClassifier};

    #[test]
    fn simulated_hands_classify_as_selected() {
        for view in [CameraView::Raw, CameraView::Mirrored] {
            let classifier = GestureClassifier::new(view);
            let mut pose = SimPose::default();
            assert_eq!(classifier.classify(&pose.frames(view)).gesture, Gesture::None);

            pose.apply(SimInput::KeyDown(SimKey::Treble));
            let r = classifier.classify(&pose.frames(view));
            assert_eq!(r.gesture, Gesture::Treble);
            let right = r.hands.unwrap().right;
            assert!((right.pinch - pose.pinch).abs() < 1e-3);
            assert!((right.palm - pose.palm).abs() < 1e-3);
        }
    }

    #[test]
    fn toggle_is_held_until_released() {
        let classifier = GestureClassifier::default();
        let mut pose = SimPose::default();
        pose.apply(SimInput::KeyDown(SimKey::Mid));
        pose.apply(SimInput::KeyDown(SimKey::Toggle));
        assert_eq!(classifier.classify(&pose.frames(CameraView::Raw)).gesture, Gesture::Toggle);
        pose.apply(SimInput::KeyUp(SimKey::Toggle));
        assert_eq!(classifier.classify(&pose.frames(CameraView::Raw)).gesture, Gesture::Mid);
    }

    #[test]
    fn pinch_and_palm_are_bounded() {
        let mut pose = SimPose::default();
        for _ in 0..200 {
            pose.apply(SimInput::KeyDown(SimKey::PinchClose));
            pose.apply(SimInput::KeyDown(SimKey::Farther));
        }
        assert_eq!(pose.pinch, PINCH_RANGE.0);
        assert_eq!(pose.palm, PALM_RANGE.0);
    }

    #[test]
    fn hidden_hands_produce_empty_frames() {
        let mut pose = SimPose::default();
        pose.apply(SimInput::KeyDown(SimKey::HideHands));
        assert!(pose.frames(CameraView::Raw).is_empty());
        assert_eq!(pose.apply(SimInput::KeyDown(SimKey::Recalibrate)), SimAction::Recalibrate);
    }

    #[test]
    fn source_emits_frames_and_quits() {
        let (sim_tx, sim_rx) = mpsc::channel();
        let rx = spawn_hand_source(SimHandSource::new(sim_rx, 200.0, CameraView::Raw));
        match rx.recv_timeout(Duration::from_secs(2)).unwrap() {
            TrackerEvent::Hands(hands) => assert_eq!(hands.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        sim_tx.send(SimInput::KeyDown(SimKey::Quit)).unwrap();
        let quit = rx.iter().find(|e| *e == TrackerEvent::Quit);
        assert!(quit.is_some());
    }
}
