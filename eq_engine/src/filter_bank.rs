//! The three band filters: low-pass, band-pass and high-pass.
//!
//! [`BankDesign`] is the pure, allocation-heavy half (validate edges, run
//! the Butterworth designers).  [`FilterBank`] is the running half that the
//! audio path owns.  Splitting them lets the control thread design new
//! filters and the audio thread merely copy coefficients in.
//!
//! The three outputs are summed, so their phases matter at the crossovers.
//! For orders 2, 6, ... the band-pass sits in antiphase with its neighbours
//! at both crossovers and the sum nulls there; those designs carry an
//! inverted band-pass.  With that, a flat bank stays within about
//! −0.5/+3 dB of unity for every order.
//!
//! A redesign always clears all three histories.  Old history belongs to a
//! different filter and cannot be continued, so a cutoff change produces a
//! short transient; gain changes never touch the filters.

use crate::error::{EngineError, Result};
use crate::settings::BandEdges;
use crate::sos::{self, SosCascade, SosCoeffs, MAX_ORDER};

/// Lowest usable edge, as a fraction of Nyquist.
const MIN_EDGE_FRACTION: f64 = 1e-4;
/// Highest usable edge, as a fraction of Nyquist.
const MAX_EDGE_FRACTION: f64 = 0.999;

// ════════════════════════════════════════════════════════════════════════════
// BankDesign
// ════════════════════════════════════════════════════════════════════════════

/// Coefficients for all three bands plus the clamped edges they were
/// designed at.
#[derive(Clone, Debug, PartialEq)]
pub struct BankDesign {
    pub sample_rate: f64,
    pub order:       usize,
    /// Edges after clamping into `(0, fs/2)`.
    pub edges:       BandEdges,
    pub low:         Vec<SosCoeffs>,
    pub mid:         Vec<SosCoeffs>,
    pub high:        Vec<SosCoeffs>,
}

impl BankDesign {
    /// Clamp, validate and design.  Nothing is produced unless all three
    /// filters can be built.
    pub fn new(sample_rate: f64, order: usize, edges: &BandEdges) -> Result<Self> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(EngineError::InvalidSampleRate(sample_rate));
        }
        if order == 0 || order > MAX_ORDER {
            return Err(EngineError::InvalidOrder(order));
        }
        for (name, v) in [
            ("low_cut", edges.low_cut),
            ("mid_center", edges.mid_center),
            ("mid_bandwidth", edges.mid_bandwidth),
            ("high_cut", edges.high_cut),
        ] {
            if !v.is_finite() {
                return Err(EngineError::NonFinite(name));
            }
        }

        let nyquist = sample_rate / 2.0;
        let clamp = |hz: f64| hz.clamp(nyquist * MIN_EDGE_FRACTION, nyquist * MAX_EDGE_FRACTION);

        let low_cut  = clamp(edges.low_cut);
        let high_cut = clamp(edges.high_cut);
        let (mid_lo, mid_hi) = edges.mid_range();
        let (mid_lo, mid_hi) = (clamp(mid_lo), clamp(mid_hi));
        if mid_lo >= mid_hi {
            return Err(EngineError::InvalidBandEdges { low: mid_lo, high: mid_hi });
        }

        let clamped = BandEdges {
            low_cut,
            mid_center:    (mid_lo + mid_hi) / 2.0,
            mid_bandwidth: mid_hi - mid_lo,
            high_cut,
        };

        let mut mid = sos::bandpass(order, mid_lo, mid_hi, sample_rate);
        if mid_inverted(order) {
            sos::invert(&mut mid);
        }

        let design = BankDesign {
            sample_rate,
            order,
            edges: clamped,
            low:   sos::lowpass(order, low_cut, sample_rate),
            mid,
            high:  sos::highpass(order, high_cut, sample_rate),
        };
        debug_assert!(design.sections().all(SosCoeffs::is_stable), "unstable design: {:?}", design);
        Ok(design)
    }
}

impl BankDesign {
    fn sections(&self) -> impl Iterator<Item = &SosCoeffs> {
        self.low.iter().chain(&self.mid).chain(&self.high)
    }
}

/// Orders whose band-pass is in antiphase with both neighbours at the
/// crossovers.
fn mid_inverted(order: usize) -> bool {
    order % 4 == 2
}

// ════════════════════════════════════════════════════════════════════════════
// FilterBank
// ════════════════════════════════════════════════════════════════════════════

/// Running low/mid/high filters with persistent history.
#[derive(Clone, Debug)]
pub struct FilterBank {
    sample_rate: f64,
    order:       usize,
    edges:       BandEdges,
    low:         SosCascade,
    mid:         SosCascade,
    high:        SosCascade,
}

impl FilterBank {
    pub fn new(sample_rate: f64, order: usize, edges: &BandEdges) -> Result<Self> {
        let design = BankDesign::new(sample_rate, order, edges)?;
        Ok(FilterBank::from_design(&design))
    }

    /// A fresh bank (zero history) running an existing design.
    pub fn from_design(design: &BankDesign) -> Self {
        FilterBank {
            sample_rate: design.sample_rate,
            order:       design.order,
            edges:       design.edges,
            low:         SosCascade::new(&design.low),
            mid:         SosCascade::new(&design.mid),
            high:        SosCascade::new(&design.high),
        }
    }

    /// Redesign all three filters at new edges.  On error the current
    /// filters and their history are left exactly as they were.
    pub fn design(&mut self, edges: &BandEdges) -> Result<()> {
        let design = BankDesign::new(self.sample_rate, self.order, edges)?;
        self.load(&design);
        Ok(())
    }

    /// Install coefficients designed elsewhere and clear history.  Does not
    /// allocate when `design` has this bank's order.
    pub fn load(&mut self, design: &BankDesign) {
        self.low.load(&design.low);
        self.mid.load(&design.mid);
        self.high.load(&design.high);
        self.edges = design.edges;
    }

    /// Filter `input` through all three bands.  Output slices must be at
    /// least as long as `input`.
    pub fn process_block(&mut self, input: &[f32], low: &mut [f32], mid: &mut [f32], high: &mut [f32]) {
        for (i, &x) in input.iter().enumerate() {
            low[i]  = self.low.process(x);
            mid[i]  = self.mid.process(x);
            high[i] = self.high.process(x);
        }
    }

    pub fn reset(&mut self) {
        self.low.reset();
        self.mid.reset();
        self.high.reset();
    }

    pub fn sample_rate(&self) -> f64 { self.sample_rate }
    pub fn order(&self) -> usize { self.order }
    /// Edges currently in effect (clamped).
    pub fn edges(&self) -> &BandEdges { &self.edges }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
