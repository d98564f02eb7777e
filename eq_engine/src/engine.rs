//! `EqualizerEngine`: filter bank → band gains → limiter, one block at a time.

use crate::error::Result;
use crate::filter_bank::FilterBank;
use crate::limiter::Limiter;
use crate::settings::{BandEdges, EqSettings, LimiterUpdate};
use crate::shared::SharedSettings;

/// Samples processed per inner pass.  Longer blocks are walked in chunks
/// of this size so `process` never allocates.
pub const SCRATCH_LEN: usize = 1024;

/// What happened to a processed block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockOutcome {
    Processed,
    /// Output went non-finite; the block was replaced with silence and the
    /// filter and limiter state were reset.
    Silenced,
}

// ════════════════════════════════════════════════════════════════════════════
// EqualizerEngine
// ════════════════════════════════════════════════════════════════════════════

/// Owns the filter history and limiter gain.  Used either directly through
/// its mutators (single thread), or from an audio callback that calls
/// [`sync`](Self::sync) once per block against a [`SharedSettings`].
pub struct EqualizerEngine {
    sample_rate: f32,
    settings:    EqSettings,
    bank:        FilterBank,
    limiter:     Limiter,
    /// Linear `(low, mid, high)` gains.
    gains:       (f32, f32, f32),

    low_buf:     Vec<f32>,
    mid_buf:     Vec<f32>,
    high_buf:    Vec<f32>,

    /// Last snapshot generation applied by `sync`.
    seen_generation: u64,
    /// Last filter design generation loaded by `sync`.
    seen_design:     u64,
}

impl EqualizerEngine {
    pub fn new(sample_rate: f32, settings: EqSettings) -> Result<Self> {
        settings.validate()?;
        let bank    = FilterBank::new(sample_rate as f64, settings.order, &settings.edges)?;
        let limiter = Limiter::new(sample_rate, settings.limiter)?;
        Ok(EqualizerEngine {
            sample_rate,
            gains: settings.gains.linear(),
            settings,
            bank,
            limiter,
            low_buf:  vec![0.0; SCRATCH_LEN],
            mid_buf:  vec![0.0; SCRATCH_LEN],
            high_buf: vec![0.0; SCRATCH_LEN],
            seen_generation: 0,
            seen_design:     0,
        })
    }

    /// Build an engine already in step with `shared`'s current snapshot.
    pub fn for_shared(shared: &SharedSettings) -> Self {
        let snap = shared.load();
        let bank = FilterBank::from_design(&snap.design);
        EqualizerEngine {
            sample_rate: shared.sample_rate() as f32,
            gains:       snap.settings.gains.linear(),
            settings:    snap.settings.clone(),
            bank,
            limiter:     Limiter::from_valid(shared.sample_rate() as f32, snap.settings.limiter),
            low_buf:     vec![0.0; SCRATCH_LEN],
            mid_buf:     vec![0.0; SCRATCH_LEN],
            high_buf:    vec![0.0; SCRATCH_LEN],
            seen_generation: snap.generation,
            seen_design:     snap.design_generation,
        }
    }

    // ── audio path ────────────────────────────────────────────────────────

    /// Pick up the latest published snapshot.  One atomic load when nothing
    /// changed; a coefficient copy (and history reset) only when the band
    /// edges changed.  Returns true when anything was applied.
    pub fn sync(&mut self, shared: &SharedSettings) -> bool {
        let snap = shared.load();
        if snap.generation == self.seen_generation {
            return false;
        }
        if snap.design_generation != self.seen_design {
            self.bank.load(&snap.design);
            self.seen_design = snap.design_generation;
        }
        // Published limiter settings were validated by the writer.
        if self.limiter.apply(&snap.settings.limiter).is_err() {
            self.limiter.reset();
        }
        self.gains           = snap.settings.gains.linear();
        self.settings        = snap.settings.clone();
        self.seen_generation = snap.generation;
        true
    }

    /// Equalize `block` in place: split into bands, weight, sum, limit.
    pub fn process(&mut self, block: &mut [f32]) -> BlockOutcome {
        let (gl, gm, gh) = self.gains;

        for chunk in block.chunks_mut(SCRATCH_LEN) {
            let n = chunk.len();
            self.bank.process_block(
                chunk,
                &mut self.low_buf[..n],
                &mut self.mid_buf[..n],
                &mut self.high_buf[..n],
            );
            for (i, out) in chunk.iter_mut().enumerate() {
                let mixed = gl * self.low_buf[i] + gm * self.mid_buf[i] + gh * self.high_buf[i];
                *out = self.limiter.limit_sample(mixed);
            }
        }

        if block.iter().all(|x| x.is_finite()) {
            BlockOutcome::Processed
        } else {
            block.fill(0.0);
            self.bank.reset();
            self.limiter.reset();
            BlockOutcome::Silenced
        }
    }

    // ── direct mutators ───────────────────────────────────────────────────

    /// Update only the supplied band gains (dB).  Takes effect on the next
    /// sample; filter history is untouched.
    pub fn set_gain(&mut self, low_db: Option<f32>, mid_db: Option<f32>, high_db: Option<f32>) -> Result<()> {
        self.settings.gains.set(low_db, mid_db, high_db)?;
        self.gains = self.settings.gains.linear();
        Ok(())
    }

    pub fn set_low_cut(&mut self, hz: f64) -> Result<()> {
        self.redesign(|e| e.set_low_cut(hz))
    }

    pub fn set_high_cut(&mut self, hz: f64) -> Result<()> {
        self.redesign(|e| e.set_high_cut(hz))
    }

    /// Partial mid update; the high-pass cutoff follows the band's upper edge.
    pub fn set_mid_band(&mut self, center: Option<f64>, bandwidth: Option<f64>) -> Result<()> {
        self.redesign(|e| e.set_mid_band(center, bandwidth))
    }

    pub fn set_limiter(&mut self, update: LimiterUpdate) -> Result<()> {
        let mut next = self.settings.limiter;
        next.apply(update)?;
        self.limiter.apply(&next)?;
        self.settings.limiter = next;
        Ok(())
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.settings.set_volume(volume)
    }

    fn redesign(&mut self, edit: impl FnOnce(&mut BandEdges) -> Result<()>) -> Result<()> {
        let mut edges = self.settings.edges;
        edit(&mut edges)?;
        self.bank.design(&edges)?;
        self.settings.edges = edges;
        Ok(())
    }

    // ── accessors ─────────────────────────────────────────────────────────

    pub fn settings(&self) -> &EqSettings { &self.settings }
    pub fn sample_rate(&self) -> f32 { self.sample_rate }
    /// Band edges actually in use, after clamping.
    pub fn active_edges(&self) -> &BandEdges { self.bank.edges() }
    pub fn limiter_gain(&self) -> f32 { self.limiter.current_gain() }

    /// Clear filter history and limiter gain.
    pub fn reset(&mut self) {
        self.bank.reset();
        self.limiter.reset();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{BandGains, LimiterSettings};
    use std::f32::consts::TAU;

    const FS: f32 = 44_100.0;

    fn sine(freq: f32, amp: f32, secs: f32) -> Vec<f32> {
        (0..(FS * secs) as usize)
            .map(|i| (TAU * freq * i as f32 / FS).sin() * amp)
            .collect()
    }

    fn rms(xs: &[f32]) -> f32 {
        (xs.iter().map(|x| x * x).sum::<f32>() / xs.len() as f32).sqrt()
    }

    fn scenario_settings() -> EqSettings {
        EqSettings {
            order:   2,
            edges:   BandEdges::from_mid(300.0, 2000.0, 800.0),
            gains:   BandGains::default(),
            limiter: LimiterSettings { threshold_db: -1.0, ..LimiterSettings::default() },
            volume:  1.0,
        }
    }

    fn unlimited() -> EqSettings {
        let mut s = scenario_settings();
        s.limiter.enabled = false;
        s
    }

    /// Ratio of output to input RMS, skipping the first 100 ms of settling.
    fn rms_ratio(engine: &mut EqualizerEngine, input: &[f32]) -> f32 {
        let mut out = input.to_vec();
        for block in out.chunks_mut(1024) {
            assert_eq!(engine.process(block), BlockOutcome::Processed);
        }
        let skip = (FS * 0.1) as usize;
        rms(&out[skip..]) / rms(&input[skip..])
    }

    #[test]
    fn derived_high_cut() {
        let e = EqualizerEngine::new(FS, scenario_settings()).unwrap();
        assert_eq!(e.settings().edges.high_cut, 2400.0);
    }

    #[test]
    fn low_tone_passes_at_unity() {
        // 1 s, 100 Hz, amplitude 0.8, all gains 0 dB, limiter at -1 dBFS.
        let mut e = EqualizerEngine::new(FS, scenario_settings()).unwrap();
        let ratio = rms_ratio(&mut e, &sine(100.0, 0.8, 1.0));
        assert!((0.95..1.02).contains(&ratio), "ratio {}", ratio);
    }

    #[test]
    fn flat_gains_pass_tones_across_crossovers() {
        // Default edges cross over at 200 Hz and 2 kHz.  The bands sum up
        // to about +3 dB at the crossovers but never cancel there.
        let mut settings = EqSettings::default();
        settings.limiter.enabled = false;
        for freq in [50.0, 150.0, 200.0, 300.0, 1000.0, 2000.0, 3000.0, 8000.0] {
            let mut e = EqualizerEngine::new(FS, settings.clone()).unwrap();
            let ratio = rms_ratio(&mut e, &sine(freq, 0.25, 0.5));
            assert!((0.9..1.5).contains(&ratio), "{} Hz ratio {}", freq, ratio);
            if freq == 200.0 || freq == 2000.0 {
                assert!(ratio > 1.3, "{} Hz ratio {}", freq, ratio);
            }
        }
    }

    #[test]
    fn band_gain_scales_its_band() {
        let mut e = EqualizerEngine::new(FS, unlimited()).unwrap();
        e.set_gain(Some(6.0), None, None).unwrap();
        let ratio = rms_ratio(&mut e, &sine(100.0, 0.25, 0.5));
        // +6 dB ≈ ×1.995, times the low-pass passband gain just under one.
        assert!((1.9..2.05).contains(&ratio), "ratio {}", ratio);

        let mut e = EqualizerEngine::new(FS, unlimited()).unwrap();
        e.set_gain(None, None, Some(-20.0)).unwrap();
        let ratio = rms_ratio(&mut e, &sine(100.0, 0.25, 0.5));
        assert!((0.95..1.05).contains(&ratio), "high cut must not touch 100 Hz: {}", ratio);
    }

    #[test]
    fn gain_change_keeps_history() {
        let mut e = EqualizerEngine::new(FS, unlimited()).unwrap();
        let mut block = sine(100.0, 0.5, 0.05);
        e.process(&mut block);
        e.set_gain(Some(-3.0), Some(0.0), Some(0.0)).unwrap();
        let mut tail = vec![0.0; 64];
        e.process(&mut tail);
        assert!(tail.iter().any(|&x| x != 0.0), "filter tail was discarded");
    }

    #[test]
    fn cutoff_change_resets_history() {
        let mut e = EqualizerEngine::new(FS, unlimited()).unwrap();
        let mut block = sine(100.0, 0.5, 0.05);
        e.process(&mut block);
        e.set_low_cut(400.0).unwrap();
        let mut tail = vec![0.0; 64];
        e.process(&mut tail);
        assert!(tail.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn rejected_mid_band_keeps_settings() {
        let mut e = EqualizerEngine::new(FS, unlimited()).unwrap();
        let before = e.settings().clone();
        assert!(e.set_mid_band(None, Some(0.0)).is_err());
        assert_eq!(e.settings(), &before);
        assert!(e.set_low_cut(f64::INFINITY).is_err());
        assert_eq!(e.settings(), &before);
    }

    #[test]
    fn partial_limiter_update() {
        let mut e = EqualizerEngine::new(FS, scenario_settings()).unwrap();
        e.set_limiter(LimiterUpdate { enabled: Some(false), ..Default::default() }).unwrap();
        assert!(!e.settings().limiter.enabled);
        assert_eq!(e.settings().limiter.threshold_db, -1.0);
        assert!(e.set_limiter(LimiterUpdate { attack_ms: Some(-1.0), ..Default::default() }).is_err());
        assert_eq!(e.settings().limiter.attack_ms, LimiterSettings::default().attack_ms);
    }

    #[test]
    fn loud_input_is_limited() {
        let mut settings = scenario_settings();
        settings.gains.low_db = 10.0;
        let mut e = EqualizerEngine::new(FS, settings).unwrap();
        let mut out = sine(100.0, 0.8, 1.0);
        for block in out.chunks_mut(1024) { e.process(block); }
        assert!(e.limiter_gain() < 0.5);
        // A 100 Hz sine lets the gain creep back between peaks, so the
        // steady state overshoots -1 dBFS a little, far under the ~2.5 peak
        // the +10 dB boost alone would give.
        let peak = out[(FS * 0.5) as usize..].iter().fold(0.0f32, |m, x| m.max(x.abs()));
        assert!(peak < 1.2, "peak {}", peak);
    }

    #[test]
    fn non_finite_input_silences_block() {
        let mut e = EqualizerEngine::new(FS, scenario_settings()).unwrap();
        let mut block = vec![0.1; 256];
        block[10] = f32::NAN;
        assert_eq!(e.process(&mut block), BlockOutcome::Silenced);
        assert!(block.iter().all(|&x| x == 0.0));

        // Recovers on the next good block.
        let mut next = vec![0.1; 256];
        assert_eq!(e.process(&mut next), BlockOutcome::Processed);
    }

    #[test]
    fn long_blocks_match_short_blocks() {
        let input = sine(440.0, 0.5, 0.2);
        let mut a = EqualizerEngine::new(FS, scenario_settings()).unwrap();
        let mut b = EqualizerEngine::new(FS, scenario_settings()).unwrap();

        let mut long = input.clone();
        a.process(&mut long);

        let mut short = input;
        for block in short.chunks_mut(300) { b.process(block); }
        assert_eq!(long, short);
    }
}
