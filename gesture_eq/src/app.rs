//! Top-level application: wires the hand source, control loop, audio
//! output and status window together.
//!
//! `AppState` owns the [`ControlLoop`] and the status line.  It consumes
//! [`TrackerEvent`]s and watches the renderer's fault counter once per
//! frame, which is where audio-thread trouble gets logged.

use std::path::Path;
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;

use anyhow::{Context, Result};
use eq_engine::{RenderStats, Renderer, SharedSettings};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::control::{Applied, Band, ControlLoop, FrameReport};
use crate::player::{OutputDevice, Player};
use crate::tracker::{spawn_hand_source, SimHandSource, SimInput, TrackerEvent};
use crate::visualizer::{View, Visualizer};
use crate::wav;

// ════════════════════════════════════════════════════════════════════════════
// AppState
// ════════════════════════════════════════════════════════════════════════════

pub struct AppState {
    control:     ControlLoop,
    last_report: Option<FrameReport>,
    seen_faults: u64,
    finished:    bool,
    pub status:  String,
}

impl AppState {
    pub fn new(control: ControlLoop) -> Self {
        AppState {
            control,
            last_report: None,
            seen_faults: 0,
            finished:    false,
            status:      "Calibrate: 5 + close pinch, 4 + open pinch, 1 to finish".to_string(),
        }
    }

    /// Returns false on `Quit`.
    pub fn handle_event(&mut self, event: TrackerEvent) -> bool {
        match event {
            TrackerEvent::Hands(hands) => {
                let report = self.control.on_frame(&hands);
                if let Some(applied) = report.applied {
                    self.status = describe(applied);
                } else if report.active != self.last_report.map_or(false, |r| r.active) {
                    self.status = if report.active { "Adjustment mode ON" } else { "Adjustment mode OFF" }.to_string();
                }
                self.last_report = Some(report);
            }
            TrackerEvent::Recalibrate => {
                self.control.recalibrate();
                self.last_report = None;
                self.status = "Recalibrating".to_string();
            }
            TrackerEvent::Quit => return false,
        }
        true
    }

    /// Per-frame housekeeping against the audio thread's counters.
    pub fn tick(&mut self, stats: &RenderStats, finished: bool) {
        let faults = stats.faults();
        if faults > self.seen_faults {
            warn!(new = faults - self.seen_faults, total = faults, "audio blocks silenced");
            self.status = format!("Audio fault: {} block(s) silenced", faults);
            self.seen_faults = faults;
        }
        if finished && !self.finished {
            info!(blocks = stats.blocks(), "playback complete");
            self.status = "Playback complete".to_string();
            self.finished = true;
        }
    }

    pub fn control(&self) -> &ControlLoop { &self.control }
    pub fn last_report(&self) -> Option<&FrameReport> { self.last_report.as_ref() }
}

fn describe(applied: Applied) -> String {
    match applied {
        Applied::Gain { band, db } => {
            let name = match band { Band::Low => "Bass", Band::Mid => "Mid", Band::High => "Treble" };
            format!("{} {:+.1} dB", name, db)
        }
        Applied::Volume(v)         => format!("Volume {:.0}%", v * 100.0),
        Applied::Calibration(step) => format!("Calibration: recorded {:?}", step),
        Applied::CalibrationDone   => "Calibrated. T toggles adjustment mode".to_string(),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// run(): interactive
// ════════════════════════════════════════════════════════════════════════════

/// Play `input` through the equalizer, controlled by the simulated hands.
pub fn run(cfg: AppConfig, input: &Path) -> Result<()> {
    let clip = wav::read_mono(input)?;
    info!(
        path = %input.display(),
        rate = clip.sample_rate,
        secs = clip.duration_secs(),
        "loaded input"
    );

    // ── Audio ─────────────────────────────────────────────────────────────
    let output = OutputDevice::open_default(clip.sample_rate)?;
    let shared = Arc::new(
        SharedSettings::new(output.sample_rate() as f64, cfg.eq.clone())
            .context("initial equalizer settings")?,
    );
    let renderer = Renderer::new(Arc::clone(&shared), clip.samples.into());
    let player = Player::start(output, renderer, cfg.audio.block_size)?;

    // ── Hands ─────────────────────────────────────────────────────────────
    let (sim_tx, sim_rx) = mpsc::channel::<SimInput>();
    let tracker_rx = spawn_hand_source(SimHandSource::new(
        sim_rx,
        cfg.audio.frame_rate,
        cfg.gesture.camera_view,
    ));

    let mut vis = Visualizer::new(sim_tx)?;
    let mut app = AppState::new(ControlLoop::new(&cfg, Arc::clone(&shared)));

    // ── Main loop ─────────────────────────────────────────────────────────
    'main: while vis.is_open() {
        if !vis.poll_input() { break; }

        loop {
            match tracker_rx.try_recv() {
                Ok(event) => {
                    if !app.handle_event(event) { break 'main; }
                }
                Err(TryRecvError::Empty)        => break,
                Err(TryRecvError::Disconnected) => break 'main,
            }
        }

        app.tick(player.stats(), player.is_finished());

        let settings = shared.settings();
        vis.render(&View {
            settings:    &settings,
            report:      app.last_report(),
            calibrating: app.control().is_calibrating(),
            active:      app.control().mode_active(),
            status:      &app.status,
        });
    }

    player.stop();
    info!("stopped");
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// render_offline()
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSummary {
    pub samples: usize,
    pub faults:  u64,
}

/// Equalize `input` with the configured settings and write the result.
pub fn render_offline(cfg: &AppConfig, input: &Path, output: &Path) -> Result<RenderSummary> {
    let clip = wav::read_mono(input)?;
    let shared = Arc::new(
        SharedSettings::new(clip.sample_rate as f64, cfg.eq.clone())
            .context("equalizer settings")?,
    );
    let mut renderer = Renderer::new(shared, clip.samples.into());
    let stats = renderer.stats();
    let out = renderer.render_all(cfg.audio.block_size);
    wav::write_mono(output, &out, clip.sample_rate)?;

    let summary = RenderSummary { samples: out.len(), faults: stats.faults() };
    if summary.faults > 0 {
        warn!(faults = summary.faults, "blocks silenced during render");
    }
    info!(path = %output.display(), samples = summary.samples, "render complete");
    Ok(summary)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{SimKey, SimPose};
    use crate::wav::tests::temp_path;
    use eq_engine::EqSettings;

    fn make_app() -> (AppState, Arc<SharedSettings>) {
        let cfg = AppConfig::default();
        let shared = Arc::new(SharedSettings::new(44_100.0, EqSettings::default()).unwrap());
        (AppState::new(ControlLoop::new(&cfg, Arc::clone(&shared))), shared)
    }

    /// Apply keys to the simulated pose and feed one frame.
    fn press(app: &mut AppState, pose: &mut SimPose, keys: &[SimKey]) {
        for &k in keys {
            pose.apply(SimInput::KeyDown(k));
        }
        assert!(app.handle_event(TrackerEvent::Hands(pose.frames(Default::default()))));
    }

    #[test]
    fn simulated_session_moves_bass_gain() {
        let (mut app, shared) = make_app();
        let mut pose = SimPose::default();

        // Calibrate: closed pinch, open pinch, done.
        pose.pinch = 20.0;
        press(&mut app, &mut pose, &[SimKey::Thumb]);
        pose.pinch = 120.0;
        press(&mut app, &mut pose, &[SimKey::All]);
        press(&mut app, &mut pose, &[SimKey::Bass]);
        assert!(!app.control().is_calibrating());

        // Toggle on, release.
        press(&mut app, &mut pose, &[SimKey::Toggle]);
        pose.apply(SimInput::KeyUp(SimKey::Toggle));
        assert!(app.control().mode_active());

        // Pinch fully open on bass: +10 dB.
        press(&mut app, &mut pose, &[SimKey::Bass]);
        assert_eq!(shared.settings().gains.low_db, 10.0);
        assert!(app.status.contains("Bass"));
    }

    #[test]
    fn recalibrate_and_quit() {
        let (mut app, _) = make_app();
        assert!(app.handle_event(TrackerEvent::Recalibrate));
        assert!(app.control().is_calibrating());
        assert!(!app.handle_event(TrackerEvent::Quit));
    }

    #[test]
    fn tick_reports_completion_once() {
        let (mut app, _) = make_app();
        let stats = RenderStats::default();
        app.tick(&stats, true);
        assert_eq!(app.status, "Playback complete");
        app.status.clear();
        app.tick(&stats, true);
        assert!(app.status.is_empty());
    }

    #[test]
    fn offline_render_writes_equalized_file() {
        let input  = temp_path("offline_in");
        let output = temp_path("offline_out");
        let samples: Vec<f32> = (0..4410)
            .map(|i| (std::f32::consts::TAU * 100.0 * i as f32 / 44_100.0).sin() * 0.5)
            .collect();
        wav::write_mono(&input, &samples, 44_100).unwrap();

        let mut cfg = AppConfig::default();
        cfg.eq.volume = 0.5;
        let summary = render_offline(&cfg, &input, &output).unwrap();
        let clip = wav::read_mono(&output).unwrap();
        std::fs::remove_file(&input).ok();
        std::fs::remove_file(&output).ok();

        assert_eq!(summary, RenderSummary { samples: 4410, faults: 0 });
        assert_eq!(clip.samples.len(), 4410);
        let peak = clip.samples.iter().fold(0.0f32, |m, x| m.max(x.abs()));
        // Halved by the volume.  100 Hz sits half an octave under the 200 Hz
        // crossover, where the default bands sum a little above unity.
        assert!(peak > 0.2 && peak < 0.35, "peak {}", peak);
    }
}
