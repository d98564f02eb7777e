//! Butterworth designs as cascaded second-order sections.
//!
//! Every design takes the same route:
//!
//! 1. analog prototype poles on the left half of the unit circle,
//! 2. low-pass / high-pass / band-pass frequency transform at prewarped
//!    edge frequencies,
//! 3. bilinear transform into the z-plane,
//! 4. conjugate roots paired into biquads, overall gain folded into the
//!    first section.
//!
//! Sections run in transposed direct form II with `f64` state.  The
//! expanded high-order polynomial is never formed, so coefficients stay
//! well conditioned up to [`MAX_ORDER`].

use std::f64::consts::PI;

use num_complex::Complex64;

/// Highest prototype order accepted by the designers.
pub const MAX_ORDER: usize = 8;

/// Imaginary parts below this are treated as real roots.
const IMAG_TOL: f64 = 1e-12;

// ════════════════════════════════════════════════════════════════════════════
// SosCoeffs
// ════════════════════════════════════════════════════════════════════════════

/// Coefficients of one biquad, normalised so that `a0 == 1`.
///
/// `H(z) = (b0 + b1 z⁻¹ + b2 z⁻²) / (1 + a1 z⁻¹ + a2 z⁻²)`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SosCoeffs {
    pub b: [f64; 3],
    pub a: [f64; 2],
}

impl SosCoeffs {
    /// Build a section from one or two z-plane zeros and poles.
    /// Pairs must be conjugates (or both real) so the coefficients are real.
    fn from_roots(zeros: &[Complex64], poles: &[Complex64]) -> Self {
        SosCoeffs {
            b: poly(zeros),
            a: {
                let p = poly(poles);
                [p[1], p[2]]
            },
        }
    }

    /// Complex response at `z⁻¹ = z_inv`.
    fn response(&self, z_inv: Complex64) -> Complex64 {
        let z2 = z_inv * z_inv;
        let num = self.b[0] + z_inv * self.b[1] + z2 * self.b[2];
        let den = 1.0 + z_inv * self.a[0] + z2 * self.a[1];
        num / den
    }

    /// True when both poles lie strictly inside the unit circle
    /// (the stability triangle for a real biquad).
    pub fn is_stable(&self) -> bool {
        let [a1, a2] = self.a;
        a2.abs() < 1.0 && a1.abs() < 1.0 + a2
    }
}

/// Monic polynomial coefficients `[1, c1, c2]` with the given roots.
fn poly(roots: &[Complex64]) -> [f64; 3] {
    match roots {
        [r]      => [1.0, -r.re, 0.0],
        [r1, r2] => [1.0, -(r1 + r2).re, (r1 * r2).re],
        _        => [1.0, 0.0, 0.0],
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Section / SosCascade: the running filters
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
struct Section {
    coeffs: SosCoeffs,
    s1:     f64,
    s2:     f64,
}

impl Section {
    fn new(coeffs: SosCoeffs) -> Self {
        Section { coeffs, s1: 0.0, s2: 0.0 }
    }

    #[inline]
    fn process(&mut self, x: f64) -> f64 {
        let SosCoeffs { b, a } = self.coeffs;
        let y   = b[0] * x + self.s1;
        self.s1 = b[1] * x - a[0] * y + self.s2;
        self.s2 = b[2] * x - a[1] * y;
        y
    }
}

/// A chain of biquads with persistent history.
#[derive(Clone, Debug, Default)]
pub struct SosCascade {
    sections: Vec<Section>,
}

impl SosCascade {
    pub fn new(coeffs: &[SosCoeffs]) -> Self {
        SosCascade { sections: coeffs.iter().copied().map(Section::new).collect() }
    }

    /// Replace the coefficients and clear history.  Reuses the existing
    /// storage when the section count is unchanged.
    pub fn load(&mut self, coeffs: &[SosCoeffs]) {
        if self.sections.len() == coeffs.len() {
            for (section, c) in self.sections.iter_mut().zip(coeffs) {
                *section = Section::new(*c);
            }
        } else {
            *self = SosCascade::new(coeffs);
        }
    }

    /// Zero all section history.
    pub fn reset(&mut self) {
        for s in &mut self.sections {
            s.s1 = 0.0;
            s.s2 = 0.0;
        }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let mut y = x as f64;
        for s in &mut self.sections {
            y = s.process(y);
        }
        y as f32
    }

    pub fn len(&self) -> usize { self.sections.len() }
    pub fn is_empty(&self) -> bool { self.sections.is_empty() }

    pub fn coeffs(&self) -> impl Iterator<Item = SosCoeffs> + '_ {
        self.sections.iter().map(|s| s.coeffs)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Designers
// ════════════════════════════════════════════════════════════════════════════
//
// Callers validate their inputs: `1 <= order <= MAX_ORDER` and every edge
// strictly inside `(0, fs/2)`.  See `filter_bank::BankDesign`.

/// Butterworth low-pass, `ceil(order / 2)` sections, unity gain at DC.
pub fn lowpass(order: usize, cutoff: f64, fs: f64) -> Vec<SosCoeffs> {
    let wc    = prewarp(cutoff, fs);
    let poles = prototype_poles(order).into_iter()
        .map(|p| bilinear(p * wc, fs))
        .collect();
    let zeros = vec![Complex64::new(-1.0, 0.0); order];
    let mut sections = pair_sections(poles, zeros);
    normalize(&mut sections, 0.0);
    sections
}

/// Butterworth high-pass, `ceil(order / 2)` sections, unity gain at Nyquist.
pub fn highpass(order: usize, cutoff: f64, fs: f64) -> Vec<SosCoeffs> {
    let wc    = prewarp(cutoff, fs);
    let poles = prototype_poles(order).into_iter()
        .map(|p| bilinear(wc / p, fs))
        .collect();
    let zeros = vec![Complex64::new(1.0, 0.0); order];
    let mut sections = pair_sections(poles, zeros);
    normalize(&mut sections, PI);
    sections
}

/// Butterworth band-pass between `low` and `high` (2·order poles,
/// `order` sections), unity gain at the geometric centre.  Both edges
/// sit at −3 dB.
pub fn bandpass(order: usize, low: f64, high: f64, fs: f64) -> Vec<SosCoeffs> {
    let w1 = prewarp(low, fs);
    let w2 = prewarp(high, fs);
    let bw = w2 - w1;
    let w0 = (w1 * w2).sqrt();

    let mut poles = Vec::with_capacity(2 * order);
    for p in prototype_poles(order) {
        // s² − p·bw·s + w0² = 0
        let half = p * bw / 2.0;
        let disc = (half * half - w0 * w0).sqrt();
        poles.push(bilinear(half + disc, fs));
        poles.push(bilinear(half - disc, fs));
    }

    // Zeros at DC and at Nyquist, one of each per section.
    let zeros = (0..2 * order)
        .map(|i| Complex64::new(if i % 2 == 0 { 1.0 } else { -1.0 }, 0.0))
        .collect();

    let mut sections = pair_sections(poles, zeros);
    normalize(&mut sections, 2.0 * (w0 / (2.0 * fs)).atan());
    sections
}

/// Flip the sign of a cascade's output.
pub fn invert(sections: &mut [SosCoeffs]) {
    if let Some(first) = sections.first_mut() {
        for b in &mut first.b {
            *b = -*b;
        }
    }
}

/// Complex response of the cascade at `freq` Hz.
pub fn complex_response(sections: &[SosCoeffs], freq: f64, fs: f64) -> Complex64 {
    let z_inv = Complex64::from_polar(1.0, -2.0 * PI * freq / fs);
    sections.iter()
        .map(|s| s.response(z_inv))
        .fold(Complex64::new(1.0, 0.0), |acc, h| acc * h)
}

/// Magnitude of the cascade at `freq` Hz.
pub fn magnitude_response(sections: &[SosCoeffs], freq: f64, fs: f64) -> f64 {
    complex_response(sections, freq, fs).norm()
}

// ── design helpers ────────────────────────────────────────────────────────

/// Unit-cutoff Butterworth prototype poles, all with negative real part.
fn prototype_poles(order: usize) -> Vec<Complex64> {
    let n = order as f64;
    (0..order)
        .map(|k| {
            let theta = PI * (2.0 * k as f64 + 1.0) / (2.0 * n) + PI / 2.0;
            Complex64::from_polar(1.0, theta)
        })
        .collect()
}

/// Analog frequency (rad/s) whose bilinear image lands on `freq` Hz.
fn prewarp(freq: f64, fs: f64) -> f64 {
    2.0 * fs * (PI * freq / fs).tan()
}

fn bilinear(s: Complex64, fs: f64) -> Complex64 {
    let k = 2.0 * fs;
    (k + s) / (k - s)
}

/// Group z-plane poles into conjugate pairs (or pairs of reals) and hand
/// each group as many zeros as it has poles.
fn pair_sections(poles: Vec<Complex64>, zeros: Vec<Complex64>) -> Vec<SosCoeffs> {
    let mut groups: Vec<Vec<Complex64>> = poles.iter()
        .filter(|p| p.im > IMAG_TOL)
        .map(|p| vec![*p, p.conj()])
        .collect();

    let mut reals: Vec<Complex64> = poles.iter()
        .filter(|p| p.im.abs() <= IMAG_TOL)
        .map(|p| Complex64::new(p.re, 0.0))
        .collect();
    reals.sort_by(|a, b| a.re.total_cmp(&b.re));
    groups.extend(reals.chunks(2).map(<[Complex64]>::to_vec));

    let mut zeros = zeros.into_iter();
    groups.iter()
        .map(|g| {
            let z: Vec<Complex64> = zeros.by_ref().take(g.len()).collect();
            SosCoeffs::from_roots(&z, g)
        })
        .collect()
}

/// Scale the first section so the cascade has unity gain at `omega`.
fn normalize(sections: &mut [SosCoeffs], omega: f64) {
    let z_inv = Complex64::from_polar(1.0, -omega);
    let gain = sections.iter()
        .map(|s| s.response(z_inv))
        .fold(Complex64::new(1.0, 0.0), |acc, h| acc * h)
        .norm();
    if let Some(first) = sections.first_mut() {
        if gain > 0.0 && gain.is_finite() {
            for b in &mut first.b {
                *b /= gain;
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
