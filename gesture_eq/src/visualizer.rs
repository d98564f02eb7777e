//! Software-rendered status window using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  MODE [on/off]     GESTURE mid         CALIBRATING ...   │
//! │                                                          │
//! │   ┌──┐     ┌──┐     ┌──┐            ┌──┐                 │
//! │   │  │     │██│     │  │            │██│                 │
//! │   │██│     │██│     │██│            │██│                 │
//! │   └──┘     └──┘     └──┘            └──┘                 │
//! │   LOW      MID      HIGH            VOL                  │
//! │                                                          │
//! │  status bar                                              │
//! │  key legend                                              │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The window also doubles as the keyboard for the hand simulator.

use std::sync::mpsc::Sender;

use anyhow::{anyhow, Result};
use eq_engine::EqSettings;
use hand_control::mapper::{GAIN_DB_MIN, GAIN_DB_SPAN};
use minifb::{Key, KeyRepeat, Window, WindowOptions};

use crate::control::{Applied, Band, FrameReport};
use crate::tracker::{SimInput, SimKey};

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:      usize = 720;
pub const WIN_H:      usize = 420;
const BAR_W:          usize = 60;
const BAR_H:          usize = 220;
const BAR_Y:          usize = 80;
const BAR_X:          [usize; 3] = [60, 170, 280];
const VOL_X:          usize = 460;
const STATUS_Y:       usize = WIN_H - 52;
const BG_COLOR:       u32   = 0xFF1A1A2E;
const PANEL_BG:       u32   = 0xFF16213E;
const TEXT_BG:        u32   = 0xFF0F3460;
const BAND_COLORS:    [u32; 3] = [0xFFE94560, 0xFFFFD700, 0xFF4FC3F7];
const VOL_COLOR:      u32   = 0xFF7CFC00;
const ACTIVE_COLOR:   u32   = 0xFF00C853;
const IDLE_COLOR:     u32   = 0xFF555555;
const CALIB_COLOR:    u32   = 0xFFFF9100;

/// Keys forwarded to the simulator: one event per press.
const PRESS_KEYS: [(Key, SimKey); 8] = [
    (Key::Key1, SimKey::Bass),
    (Key::Key2, SimKey::Mid),
    (Key::Key3, SimKey::Treble),
    (Key::Key4, SimKey::All),
    (Key::Key5, SimKey::Thumb),
    (Key::H,    SimKey::HideHands),
    (Key::R,    SimKey::Recalibrate),
    (Key::Q,    SimKey::Quit),
];

/// Keys that repeat while held.
const HELD_KEYS: [(Key, SimKey); 6] = [
    (Key::Up,    SimKey::PinchOpen),
    (Key::Down,  SimKey::PinchClose),
    (Key::Left,  SimKey::TiltUp),
    (Key::Right, SimKey::TiltDown),
    (Key::W,     SimKey::Closer),
    (Key::S,     SimKey::Farther),
];

/// What the window shows in one frame.
pub struct View<'a> {
    pub settings:    &'a EqSettings,
    pub report:      Option<&'a FrameReport>,
    pub calibrating: bool,
    pub active:      bool,
    pub status:      &'a str,
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window:      Window,
    buf:         Vec<u32>,
    sim_tx:      Sender<SimInput>,
    toggle_down: bool,
}

impl Visualizer {
    pub fn new(sim_tx: Sender<SimInput>) -> Result<Self> {
        let mut window = Window::new(
            "Gesture EQ",
            WIN_W, WIN_H,
            WindowOptions { resize: false, ..WindowOptions::default() },
        ).map_err(|e| anyhow!("opening window: {}", e))?;

        window.limit_update_rate(Some(std::time::Duration::from_millis(16)));

        Ok(Visualizer {
            window,
            buf: vec![BG_COLOR; WIN_W * WIN_H],
            sim_tx,
            toggle_down: false,
        })
    }

    pub fn is_open(&self) -> bool { self.window.is_open() }

    /// Forward keyboard state to the simulator.  Returns false when the
    /// window should close.
    pub fn poll_input(&mut self) -> bool {
        if !self.window.is_open() || self.window.is_key_down(Key::Escape) {
            return false;
        }
        let send = |k| { let _ = self.sim_tx.send(SimInput::KeyDown(k)); };

        for (key, sim) in PRESS_KEYS {
            if self.window.is_key_pressed(key, KeyRepeat::No) {
                send(sim);
                if sim == SimKey::Quit { return false; }
            }
        }
        for (key, sim) in HELD_KEYS {
            if self.window.is_key_pressed(key, KeyRepeat::Yes) {
                send(sim);
            }
        }

        // Toggle is a held pose: report both edges.
        let toggle = self.window.is_key_down(Key::T);
        if toggle != self.toggle_down {
            let input = if toggle { SimInput::KeyDown(SimKey::Toggle) } else { SimInput::KeyUp(SimKey::Toggle) };
            let _ = self.sim_tx.send(input);
            self.toggle_down = toggle;
        }
        true
    }

    pub fn render(&mut self, view: &View) {
        self.buf.fill(BG_COLOR);

        // ── header ────────────────────────────────────────────────────────
        let mode_color = if view.active { ACTIVE_COLOR } else { IDLE_COLOR };
        self.fill_rect(20, 20, 16, 16, mode_color);
        self.draw_text(if view.active { "MODE ON" } else { "MODE OFF" }, 44, 23, 2, 0xFFEEEEEE);

        if let Some(report) = view.report {
            let label = format!("GESTURE {}", report.gesture.label());
            let color = if report.tracked { 0xFFEEEEEE } else { 0xFF888888 };
            self.draw_text(&label, 180, 23, 2, color);
        }
        if view.calibrating {
            self.fill_rect(380, 16, 320, 24, CALIB_COLOR);
            self.draw_text("CALIBRATING 5=MIN 4=MAX 1=DONE", 388, 23, 2, 0xFF000000);
        }

        // ── band gains ────────────────────────────────────────────────────
        let gains = &view.settings.gains;
        let selected = match view.report.and_then(|r| r.applied) {
            Some(Applied::Gain { band, .. }) => Some(band),
            _ => None,
        };
        let bands = [
            (Band::Low,  "LOW",  gains.low_db),
            (Band::Mid,  "MID",  gains.mid_db),
            (Band::High, "HIGH", gains.high_db),
        ];
        for (i, (band, name, db)) in bands.into_iter().enumerate() {
            let x = BAR_X[i];
            self.draw_bar(x, gain_fraction(db), BAND_COLORS[i], selected == Some(band));
            self.draw_text(name, x + 4, BAR_Y + BAR_H + 8, 2, 0xFFEEEEEE);
            self.draw_label(&format!("{:+.1}DB", db), x + 4, BAR_Y + BAR_H + 24, 0xFFAAAAAA);
        }

        // ── volume ────────────────────────────────────────────────────────
        let volume = view.settings.volume;
        let vol_selected = matches!(view.report.and_then(|r| r.applied), Some(Applied::Volume(_)));
        self.draw_bar(VOL_X, volume, VOL_COLOR, vol_selected);
        self.draw_text("VOL", VOL_X + 4, BAR_Y + BAR_H + 8, 2, 0xFFEEEEEE);
        self.draw_label(&format!("{:.0}%", volume * 100.0), VOL_X + 4, BAR_Y + BAR_H + 24, 0xFFAAAAAA);

        // ── status bar ────────────────────────────────────────────────────
        self.fill_rect(0, STATUS_Y, WIN_W, WIN_H - STATUS_Y, TEXT_BG);
        self.draw_text(view.status, 10, STATUS_Y + 8, 2, 0xFFEEEEEE);
        self.draw_label(
            "1-4=BAND/VOL  T=TOGGLE  UP/DOWN=PINCH  LEFT/RIGHT=TILT  W/S=DIST  H=HIDE  R=RECAL  Q=QUIT",
            10, WIN_H - 16, 0xFF888888,
        );

        self.window.update_with_buffer(&self.buf, WIN_W, WIN_H).ok();
    }

    fn draw_bar(&mut self, x: usize, fraction: f32, color: u32, selected: bool) {
        self.fill_rect(x, BAR_Y, BAR_W, BAR_H, PANEL_BG);
        let h = (fraction.clamp(0.0, 1.0) * BAR_H as f32) as usize;
        self.fill_rect(x, BAR_Y + BAR_H - h, BAR_W, h, color);
        let border = if selected { blend(color, 0xFFFFFFFF, 0.5) } else { 0xFF000000 };
        self.draw_border(x, BAR_Y, BAR_W, BAR_H, border);
    }

    // ── pixels ────────────────────────────────────────────────────────────

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        let (x1, y1) = ((x + w).min(WIN_W), (y + h).min(WIN_H));
        if x >= x1 { return; }
        for row in y..y1 {
            self.buf[row * WIN_W + x..row * WIN_W + x1].fill(color);
        }
    }

    fn draw_border(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        if w == 0 || h == 0 { return; }
        self.fill_rect(x, y, w, 1, color);
        self.fill_rect(x, y + h - 1, w, 1, color);
        self.fill_rect(x, y, 1, h, color);
        self.fill_rect(x + w - 1, y, 1, h, color);
    }

    /// Text in the 3×5 font, each font pixel drawn `scale`×`scale`.
    fn draw_text(&mut self, text: &str, x: usize, y: usize, scale: usize, color: u32) {
        let advance = (GLYPH_W + 1) * scale;
        for (i, ch) in text.chars().enumerate() {
            let gx = x + i * advance;
            if gx + advance > WIN_W { break; }
            let bits = glyph(ch);
            for row in 0..GLYPH_H {
                let row_bits = (bits >> (3 * (GLYPH_H - 1 - row))) & 0o7;
                for col in 0..GLYPH_W {
                    if row_bits & (0b100 >> col) != 0 {
                        self.fill_rect(gx + col * scale, y + row * scale, scale, scale, color);
                    }
                }
            }
        }
    }

    fn draw_label(&mut self, text: &str, x: usize, y: usize, color: u32) {
        self.draw_text(text, x, y, 1, color);
    }
}

/// Where a band gain sits on the slider, `0` at -20 dB, `1` at +10 dB.
pub fn gain_fraction(db: f32) -> f32 {
    ((db - GAIN_DB_MIN) / GAIN_DB_SPAN).clamp(0.0, 1.0)
}

// ── 3×5 font ───────────────────────────────────────────────────────────────
//
// One octal digit per row, top row first; bit 2 is the left column.

const GLYPH_W: usize = 3;
const GLYPH_H: usize = 5;

fn glyph(c: char) -> u16 {
    match c.to_ascii_uppercase() {
        '0' => 0o75557, '1' => 0o26227, '2' => 0o71747, '3' => 0o71717,
        '4' => 0o55711, '5' => 0o74717, '6' => 0o74757, '7' => 0o71111,
        '8' => 0o75757, '9' => 0o75717, 'A' => 0o75755, 'B' => 0o65656,
        'C' => 0o74447, 'D' => 0o65556, 'E' => 0o74747, 'F' => 0o74744,
        'G' => 0o74557, 'H' => 0o55755, 'I' => 0o72227, 'J' => 0o11157,
        'K' => 0o55655, 'L' => 0o44447, 'M' => 0o57555, 'N' => 0o75555,
        'O' => 0o75557, 'P' => 0o75744, 'Q' => 0o75571, 'R' => 0o65655,
        'S' => 0o74717, 'T' => 0o72222, 'U' => 0o55557, 'V' => 0o55522,
        'W' => 0o55575, 'X' => 0o55255, 'Y' => 0o55722, 'Z' => 0o71247,
        '/' => 0o11244, '-' => 0o00700, '+' => 0o02720, '.' => 0o00002,
        ':' => 0o02020, '=' => 0o07070, '%' => 0o51245, ' ' => 0o00000,
        _ => 0o00200,
    }
}

/// Alpha-blend two ARGB colors. `t` = 0.0 → all `a`, `t` = 1.0 → all `b`.
fn blend(a: u32, b: u32, t: f32) -> u32 {
    let t = t.clamp(0.0, 1.0);
    let lerp = |ca: u32, cb: u32| (ca as f32 * (1.0 - t) + cb as f32 * t) as u32;
    let channel = |c: u32, shift: u32| (c >> shift) & 0xFF;
    0xFF000000
        | (lerp(channel(a, 16), channel(b, 16)) << 16)
        | (lerp(channel(a, 8), channel(b, 8)) << 8)
        | lerp(channel(a, 0), channel(b, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slider_fraction() {
        assert_eq!(gain_fraction(-20.0), 0.0);
        assert_eq!(gain_fraction(10.0), 1.0);
        assert_eq!(gain_fraction(-5.0), 0.5);
        assert_eq!(gain_fraction(40.0), 1.0);
    }

    #[test]
    fn glyph_rows_decode_top_first() {
        // 0o26227: .#. / ##. / .#. / .#. / ###
        let rows: Vec<u16> = (0..GLYPH_H).map(|r| (glyph('1') >> (3 * (GLYPH_H - 1 - r))) & 0o7).collect();
        assert_eq!(rows, [0b010, 0b110, 0b010, 0b010, 0b111]);
        assert_eq!(glyph('a'), glyph('A'));
    }

    #[test]
    fn blend_endpoints() {
        assert_eq!(blend(0xFF102030, 0xFFFFFFFF, 0.0), 0xFF102030);
        assert_eq!(blend(0xFF102030, 0xFFFFFFFF, 1.0), 0xFFFFFFFF);
    }
}
