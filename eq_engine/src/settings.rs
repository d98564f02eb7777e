//! Plain-data equalizer settings.
//!
//! [`EqSettings`] is the value the control side edits and publishes.  Its
//! mutators validate first and mutate second, so a rejected update leaves
//! the settings exactly as they were.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::sos::MAX_ORDER;

// ════════════════════════════════════════════════════════════════════════════
// BandEdges
// ════════════════════════════════════════════════════════════════════════════

/// Crossover frequencies in Hz.
///
/// The band-pass spans `mid_center ± mid_bandwidth / 2`.  Changing either
/// mid value recomputes `high_cut` as the band's upper edge; an explicit
/// [`BandEdges::set_high_cut`] overrides that until the next mid change.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandEdges {
    pub low_cut:       f64,
    pub mid_center:    f64,
    pub mid_bandwidth: f64,
    pub high_cut:      f64,
}

impl Default for BandEdges {
    fn default() -> Self {
        BandEdges::from_mid(200.0, 1100.0, 1800.0)
    }
}

impl BandEdges {
    /// Edges with `high_cut` derived from the mid band.
    pub fn from_mid(low_cut: f64, mid_center: f64, mid_bandwidth: f64) -> Self {
        BandEdges {
            low_cut,
            mid_center,
            mid_bandwidth,
            high_cut: mid_center + mid_bandwidth / 2.0,
        }
    }

    /// Lower and upper edge of the band-pass, before any clamping.
    pub fn mid_range(&self) -> (f64, f64) {
        let half = self.mid_bandwidth / 2.0;
        (self.mid_center - half, self.mid_center + half)
    }

    pub fn set_low_cut(&mut self, hz: f64) -> Result<()> {
        self.low_cut = finite(hz, "low_cut")?;
        Ok(())
    }

    pub fn set_high_cut(&mut self, hz: f64) -> Result<()> {
        self.high_cut = finite(hz, "high_cut")?;
        Ok(())
    }

    /// Partial mid update; `high_cut` follows the new upper edge.
    pub fn set_mid_band(&mut self, center: Option<f64>, bandwidth: Option<f64>) -> Result<()> {
        let center    = center.map(|c| finite(c, "mid_center")).transpose()?;
        let bandwidth = bandwidth.map(|b| finite(b, "mid_bandwidth")).transpose()?;
        if center.is_none() && bandwidth.is_none() {
            return Ok(());
        }
        if let Some(c) = center    { self.mid_center    = c; }
        if let Some(b) = bandwidth { self.mid_bandwidth = b; }
        self.high_cut = self.mid_range().1;
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// BandGains
// ════════════════════════════════════════════════════════════════════════════

/// Per-band gain in dB.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandGains {
    pub low_db:  f32,
    pub mid_db:  f32,
    pub high_db: f32,
}

impl BandGains {
    /// Update only the supplied bands.
    pub fn set(&mut self, low_db: Option<f32>, mid_db: Option<f32>, high_db: Option<f32>) -> Result<()> {
        let low  = low_db.map(|v| finite32(v, "low_db")).transpose()?;
        let mid  = mid_db.map(|v| finite32(v, "mid_db")).transpose()?;
        let high = high_db.map(|v| finite32(v, "high_db")).transpose()?;
        if let Some(v) = low  { self.low_db  = v; }
        if let Some(v) = mid  { self.mid_db  = v; }
        if let Some(v) = high { self.high_db = v; }
        Ok(())
    }

    /// Linear gains `(low, mid, high)`.
    pub fn linear(&self) -> (f32, f32, f32) {
        (
            crate::db_to_linear(self.low_db),
            crate::db_to_linear(self.mid_db),
            crate::db_to_linear(self.high_db),
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LimiterSettings
// ════════════════════════════════════════════════════════════════════════════

/// Limiter parameters as configured by the user.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterSettings {
    pub threshold_db: f32,
    pub attack_ms:    f32,
    pub release_ms:   f32,
    pub enabled:      bool,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        LimiterSettings {
            threshold_db: -1.0,
            attack_ms:    5.0,
            release_ms:   100.0,
            enabled:      true,
        }
    }
}

/// Partial limiter update; `None` fields keep their current value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LimiterUpdate {
    pub threshold_db: Option<f32>,
    pub attack_ms:    Option<f32>,
    pub release_ms:   Option<f32>,
    pub enabled:      Option<bool>,
}

impl LimiterSettings {
    /// Apply `update` on a copy, validate the result, then commit.
    pub fn apply(&mut self, update: LimiterUpdate) -> Result<()> {
        let next = LimiterSettings {
            threshold_db: update.threshold_db.unwrap_or(self.threshold_db),
            attack_ms:    update.attack_ms.unwrap_or(self.attack_ms),
            release_ms:   update.release_ms.unwrap_or(self.release_ms),
            enabled:      update.enabled.unwrap_or(self.enabled),
        };
        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.threshold_db.is_finite() || crate::db_to_linear(self.threshold_db) <= 0.0 {
            return Err(EngineError::InvalidThreshold(self.threshold_db));
        }
        for (name, value) in [("attack_ms", self.attack_ms), ("release_ms", self.release_ms)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(EngineError::InvalidTimeConstant { name, value });
            }
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// EqSettings
// ════════════════════════════════════════════════════════════════════════════

/// Everything the audio path needs to know, as one immutable value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqSettings {
    /// Butterworth prototype order for all three bands.  Fixed once an
    /// engine is built.
    pub order:   usize,
    pub edges:   BandEdges,
    pub gains:   BandGains,
    pub limiter: LimiterSettings,
    /// Master volume in `[0, 1]`, applied after the limiter.
    pub volume:  f32,
}

impl Default for EqSettings {
    fn default() -> Self {
        EqSettings {
            order:   2,
            edges:   BandEdges::default(),
            gains:   BandGains::default(),
            limiter: LimiterSettings::default(),
            volume:  1.0,
        }
    }
}

impl EqSettings {
    /// Check the parts that don't depend on the sample rate.  Band edges
    /// are validated by the filter design.
    pub fn validate(&self) -> Result<()> {
        if self.order == 0 || self.order > MAX_ORDER {
            return Err(EngineError::InvalidOrder(self.order));
        }
        self.limiter.validate()?;
        finite32(self.volume, "volume")?;
        for (name, v) in [
            ("low_db", self.gains.low_db),
            ("mid_db", self.gains.mid_db),
            ("high_db", self.gains.high_db),
        ] {
            finite32(v, name)?;
        }
        Ok(())
    }

    pub fn set_gain(&mut self, low_db: Option<f32>, mid_db: Option<f32>, high_db: Option<f32>) -> Result<()> {
        self.gains.set(low_db, mid_db, high_db)
    }

    /// Volume is clamped into `[0, 1]`; only NaN/∞ is rejected.
    pub fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.volume = finite32(volume, "volume")?.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_limiter(&mut self, update: LimiterUpdate) -> Result<()> {
        self.limiter.apply(update)
    }
}

fn finite(v: f64, name: &'static str) -> Result<f64> {
    if v.is_finite() { Ok(v) } else { Err(EngineError::NonFinite(name)) }
}

fn finite32(v: f32, name: &'static str) -> Result<f32> {
    if v.is_finite() { Ok(v) } else { Err(EngineError::NonFinite(name)) }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mid_change_recomputes_high_cut() {
        let mut e = BandEdges::from_mid(300.0, 1000.0, 400.0);
        assert_eq!(e.high_cut, 1200.0);
        e.set_mid_band(Some(2000.0), Some(800.0)).unwrap();
        assert_eq!(e.high_cut, 2400.0);
        e.set_mid_band(None, Some(1000.0)).unwrap();
        assert_eq!(e.high_cut, 2500.0);
    }

    #[test]
    fn explicit_high_cut_overrides_until_next_mid_change() {
        let mut e = BandEdges::from_mid(300.0, 2000.0, 800.0);
        e.set_high_cut(5000.0).unwrap();
        assert_eq!(e.high_cut, 5000.0);
        e.set_mid_band(Some(1500.0), None).unwrap();
        assert_eq!(e.high_cut, 1900.0);
    }

    #[test]
    fn empty_mid_update_is_noop() {
        let mut e = BandEdges::from_mid(300.0, 2000.0, 800.0);
        e.set_high_cut(5000.0).unwrap();
        e.set_mid_band(None, None).unwrap();
        assert_eq!(e.high_cut, 5000.0);
    }

    #[test]
    fn nan_mid_leaves_edges_untouched() {
        let mut e = BandEdges::from_mid(300.0, 2000.0, 800.0);
        let before = e;
        assert!(e.set_mid_band(Some(2500.0), Some(f64::NAN)).is_err());
        assert_eq!(e, before);
    }

    #[test]
    fn partial_gain_update() {
        let mut g = BandGains::default();
        g.set(Some(3.0), None, Some(-6.0)).unwrap();
        assert_eq!(g, BandGains { low_db: 3.0, mid_db: 0.0, high_db: -6.0 });
        g.set(None, Some(1.5), None).unwrap();
        assert_eq!(g.mid_db, 1.5);
        assert_eq!(g.low_db, 3.0);
    }

    #[test]
    fn limiter_partial_update_keeps_other_fields() {
        let mut l = LimiterSettings::default();
        l.apply(LimiterUpdate { release_ms: Some(250.0), ..Default::default() }).unwrap();
        assert_eq!(l.release_ms, 250.0);
        assert_eq!(l.threshold_db, -1.0);
        assert!(l.enabled);
    }

    #[test]
    fn limiter_rejects_bad_values_and_keeps_prior() {
        let mut l = LimiterSettings::default();
        let before = l;
        assert!(l.apply(LimiterUpdate { threshold_db: Some(f32::NAN), ..Default::default() }).is_err());
        assert!(l.apply(LimiterUpdate { threshold_db: Some(f32::NEG_INFINITY), ..Default::default() }).is_err());
        assert!(l.apply(LimiterUpdate { attack_ms: Some(0.0), ..Default::default() }).is_err());
        assert!(l.apply(LimiterUpdate {
            threshold_db: Some(-3.0),
            release_ms: Some(-5.0),
            ..Default::default()
        }).is_err());
        assert_eq!(l, before);
    }

    #[test]
    fn volume_is_clamped() {
        let mut s = EqSettings::default();
        s.set_volume(1.7).unwrap();
        assert_eq!(s.volume, 1.0);
        s.set_volume(-0.2).unwrap();
        assert_eq!(s.volume, 0.0);
        assert!(s.set_volume(f32::NAN).is_err());
    }

    #[test]
    fn order_range_validated() {
        let mut s = EqSettings::default();
        s.order = 0;
        assert_eq!(s.validate(), Err(EngineError::InvalidOrder(0)));
        s.order = MAX_ORDER + 1;
        assert!(s.validate().is_err());
        s.order = MAX_ORDER;
        assert!(s.validate().is_ok());
    }
}
