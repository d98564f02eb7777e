//! Per-sample peak limiter with attack/release gain smoothing.
//!
//! For each sample the target gain is `threshold / |x|` when the sample is
//! over threshold, else unity.  The applied gain follows the target through
//! a one-pole smoother: the attack coefficient while the gain has to fall,
//! the release coefficient while it recovers.  The smoother is a first-order
//! IIR, so it must run per sample; stepping it per block would stretch the
//! time constants by the block size.

use crate::error::{EngineError, Result};
use crate::settings::LimiterSettings;

/// Guards the `threshold / level` division.
const LEVEL_EPSILON: f32 = 1e-15;

/// One-pole smoothing coefficient for a time constant in milliseconds.
/// Smaller times give smaller coefficients and faster convergence.
pub fn time_coeff(time_ms: f32, sample_rate: f32) -> f32 {
    (-1.0 / (time_ms * sample_rate * 0.001)).exp()
}

#[derive(Clone, Debug)]
pub struct Limiter {
    sample_rate:   f32,
    settings:      LimiterSettings,
    threshold:     f32,
    attack_coeff:  f32,
    release_coeff: f32,
    /// Applied gain in `(0, 1]`; the only state carried between calls.
    current_gain:  f32,
}

impl Limiter {
    pub fn new(sample_rate: f32, settings: LimiterSettings) -> Result<Self> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(EngineError::InvalidSampleRate(sample_rate as f64));
        }
        settings.validate()?;
        Ok(Limiter::from_valid(sample_rate, settings))
    }

    /// Build from settings the caller has already validated.
    pub(crate) fn from_valid(sample_rate: f32, settings: LimiterSettings) -> Self {
        Limiter {
            sample_rate,
            settings,
            threshold:     crate::db_to_linear(settings.threshold_db),
            attack_coeff:  time_coeff(settings.attack_ms, sample_rate),
            release_coeff: time_coeff(settings.release_ms, sample_rate),
            current_gain:  1.0,
        }
    }

    /// Set all parameters at once.  Invalid values are rejected and the
    /// previous configuration stays in effect.  The running gain is kept.
    pub fn configure(&mut self, threshold_db: f32, attack_ms: f32, release_ms: f32, enabled: bool) -> Result<()> {
        let next = LimiterSettings { threshold_db, attack_ms, release_ms, enabled };
        next.validate()?;

        let threshold = crate::db_to_linear(threshold_db);
        if threshold <= 0.0 || !threshold.is_finite() {
            return Err(EngineError::InvalidThreshold(threshold_db));
        }

        self.settings      = next;
        self.threshold     = threshold;
        self.attack_coeff  = time_coeff(attack_ms, self.sample_rate);
        self.release_coeff = time_coeff(release_ms, self.sample_rate);
        Ok(())
    }

    /// Same as [`configure`](Self::configure) but from a settings value.
    pub fn apply(&mut self, settings: &LimiterSettings) -> Result<()> {
        if *settings == self.settings {
            return Ok(());
        }
        self.configure(settings.threshold_db, settings.attack_ms, settings.release_ms, settings.enabled)
    }

    #[inline]
    pub fn limit_sample(&mut self, x: f32) -> f32 {
        if !self.settings.enabled {
            return x;
        }
        let level = x.abs();
        let target = if level > self.threshold {
            self.threshold / (level + LEVEL_EPSILON)
        } else {
            1.0
        };
        let coeff = if target < self.current_gain { self.attack_coeff } else { self.release_coeff };
        self.current_gain = coeff * self.current_gain + (1.0 - coeff) * target;
        x * self.current_gain
    }

    pub fn process(&mut self, block: &mut [f32]) {
        for x in block.iter_mut() {
            *x = self.limit_sample(*x);
        }
    }

    /// Return the gain to unity.
    pub fn reset(&mut self) {
        self.current_gain = 1.0;
    }

    pub fn current_gain(&self) -> f32 { self.current_gain }
    pub fn threshold(&self) -> f32 { self.threshold }
    pub fn settings(&self) -> &LimiterSettings { &self.settings }
    pub fn is_enabled(&self) -> bool { self.settings.enabled }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FS: f32 = 44_100.0;

    fn limiter(threshold_db: f32) -> Limiter {
        Limiter::new(FS, LimiterSettings {
            threshold_db,
            attack_ms:  5.0,
            release_ms: 100.0,
            enabled:    true,
        }).unwrap()
    }

    /// Square wave at `amp`: constant level, sustained.
    fn square(amp: f32, n: usize) -> Vec<f32> {
        (0..n).map(|i| if (i / 50) % 2 == 0 { amp } else { -amp }).collect()
    }

    #[test]
    fn faster_time_gives_smaller_coeff() {
        assert!(time_coeff(1.0, FS) < time_coeff(10.0, FS));
        assert!(time_coeff(10.0, FS) < time_coeff(100.0, FS));
        let c = time_coeff(1.0, FS);
        assert!((c - (-1.0f32 / 44.1).exp()).abs() < 1e-7);
    }

    #[test]
    fn disabled_is_passthrough() {
        let mut l = limiter(-20.0);
        l.configure(-20.0, 5.0, 100.0, false).unwrap();
        let mut block = square(0.9, 1000);
        let before = block.clone();
        l.process(&mut block);
        assert_eq!(block, before);
        assert_eq!(l.current_gain(), 1.0);
    }

    #[test]
    fn below_threshold_untouched() {
        let mut l = limiter(-1.0);
        for &x in &square(0.5, 2000) {
            assert_eq!(l.limit_sample(x), x);
        }
    }

    #[test]
    fn converged_output_stays_under_threshold() {
        let mut l = limiter(-6.0);
        let threshold = l.threshold();
        let mut block = square(0.95, (FS * 0.5) as usize);
        l.process(&mut block);
        // 10 attack time constants in: converged.
        let settled = (FS * 0.05) as usize;
        for &y in &block[settled..] {
            assert!(y.abs() <= threshold * 1.001, "{} > {}", y.abs(), threshold);
        }
    }

    #[test]
    fn sine_peaks_overshoot_threshold_by_a_tenth() {
        // The gain creeps back up through each zero crossing, so a sustained
        // sine settles about 10% over the threshold at any audio frequency.
        for freq in [100.0f32, 1000.0] {
            let mut l = limiter(-6.0);
            let threshold = l.threshold();
            let mut block: Vec<f32> = (0..(FS * 0.5) as usize)
                .map(|i| (std::f32::consts::TAU * freq * i as f32 / FS).sin() * 0.95)
                .collect();
            l.process(&mut block);
            let peak = block[(FS * 0.3) as usize..].iter().fold(0.0f32, |m, x| m.max(x.abs()));
            assert!(peak > threshold * 1.05, "{} Hz peak {}", freq, peak);
            assert!(peak <= threshold * 1.15, "{} Hz peak {}", freq, peak);
        }
    }

    #[test]
    fn gain_recovers_slowly_after_loud_passage() {
        let mut l = limiter(-6.0);
        let mut loud = square(0.95, 4410);
        l.process(&mut loud);
        let ducked = l.current_gain();
        assert!(ducked < 0.6);

        // One release time constant of quiet signal: part-way back.
        let mut quiet = vec![0.1f32; (FS * 0.1) as usize];
        l.process(&mut quiet);
        let g = l.current_gain();
        assert!(g > ducked && g < 1.0);
        let expected = 1.0 - (1.0 - ducked) * (-1.0f32).exp();
        assert!((g - expected).abs() < 0.01, "{} vs {}", g, expected);
    }

    #[test]
    fn gain_persists_across_calls() {
        let mut a = limiter(-6.0);
        let mut b = limiter(-6.0);
        let signal = square(0.95, 2048);

        let mut whole = signal.clone();
        a.process(&mut whole);

        let mut split = signal;
        for chunk in split.chunks_mut(256) {
            b.process(chunk);
        }
        assert_eq!(whole, split);
    }

    #[test]
    fn invalid_configure_keeps_previous() {
        let mut l = limiter(-6.0);
        let threshold = l.threshold();
        assert!(l.configure(f32::NAN, 5.0, 100.0, true).is_err());
        assert!(l.configure(-3.0, f32::INFINITY, 100.0, true).is_err());
        assert!(l.configure(-3.0, 5.0, 0.0, true).is_err());
        assert_eq!(l.threshold(), threshold);
        assert_eq!(l.settings().threshold_db, -6.0);
    }

    proptest! {
        #[test]
        fn never_amplifies(xs in proptest::collection::vec(-1.0f32..1.0, 1..2000)) {
            let mut l = limiter(-12.0);
            for x in xs {
                let y = l.limit_sample(x);
                prop_assert!(y.abs() <= x.abs() + 1e-7);
                prop_assert!(l.current_gain() > 0.0 && l.current_gain() <= 1.0 + 1e-6);
            }
        }
    }
}
