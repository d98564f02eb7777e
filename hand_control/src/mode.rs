//! Adjustment-mode toggle with edge detection and a cooldown.

use tracing::debug;

use crate::gesture::Gesture;

/// Frames after a flip during which another flip is ignored.
pub const DEFAULT_COOLDOWN_FRAMES: u32 = 20;

/// Flips on the rising edge of [`Gesture::Toggle`] when no cooldown is
/// pending.  Holding the gesture flips once; it has to be released and
/// shown again after the cooldown to flip back.
#[derive(Clone, Debug)]
pub struct ModeController {
    active:               bool,
    previous_toggle_held: bool,
    cooldown:             u32,
    cooldown_frames:      u32,
}

impl Default for ModeController {
    fn default() -> Self { ModeController::new(DEFAULT_COOLDOWN_FRAMES) }
}

impl ModeController {
    pub fn new(cooldown_frames: u32) -> Self {
        ModeController {
            active: false,
            previous_toggle_held: false,
            cooldown: 0,
            cooldown_frames,
        }
    }

    /// Advance one frame.  Returns whether adjustment mode is active.
    pub fn step(&mut self, gesture: Gesture) -> bool {
        if gesture == Gesture::Toggle {
            if !self.previous_toggle_held && self.cooldown == 0 {
                self.active   = !self.active;
                self.cooldown = self.cooldown_frames;
                debug!(active = self.active, "adjustment mode toggled");
            }
            self.previous_toggle_held = true;
        } else {
            self.previous_toggle_held = false;
        }
        // Counts down in the flip frame too.
        self.cooldown = self.cooldown.saturating_sub(1);
        self.active
    }

    pub fn is_active(&self) -> bool { self.active }
    pub fn cooldown(&self) -> u32 { self.cooldown }

    /// Back to inactive with no cooldown.
    pub fn reset(&mut self) {
        *self = ModeController::new(self.cooldown_frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flips(mode: &mut ModeController, gestures: impl IntoIterator<Item = Gesture>) -> usize {
        let mut last = mode.is_active();
        let mut n = 0;
        for g in gestures {
            let now = mode.step(g);
            if now != last { n += 1; }
            last = now;
        }
        n
    }

    #[test]
    fn held_toggle_flips_once() {
        let mut m = ModeController::new(20);
        assert_eq!(flips(&mut m, std::iter::repeat(Gesture::Toggle).take(40)), 1);
        assert!(m.is_active());
    }

    #[test]
    fn chattering_toggle_flips_twice_in_two_cooldowns() {
        let mut m = ModeController::new(20);
        let chatter = (0..40).map(|i| if i % 2 == 0 { Gesture::Toggle } else { Gesture::None });
        assert_eq!(flips(&mut m, chatter), 2);
        assert!(!m.is_active());
    }

    #[test]
    fn release_and_reassert_after_cooldown() {
        let mut m = ModeController::new(3);
        assert!(m.step(Gesture::Toggle));
        assert_eq!(m.cooldown(), 2);
        assert!(m.step(Gesture::Mid));
        assert!(m.step(Gesture::Mid));
        assert_eq!(m.cooldown(), 0);
        assert!(!m.step(Gesture::Toggle));
    }

    #[test]
    fn reassert_during_cooldown_is_ignored() {
        let mut m = ModeController::new(5);
        m.step(Gesture::Toggle);
        m.step(Gesture::None);
        assert!(m.step(Gesture::Toggle));
        assert!(m.is_active());
    }

    #[test]
    fn other_gestures_never_flip() {
        let mut m = ModeController::default();
        let gs = [Gesture::Bass, Gesture::Mid, Gesture::Treble, Gesture::All, Gesture::None];
        assert_eq!(flips(&mut m, gs.iter().copied().cycle().take(100)), 0);
    }
}
