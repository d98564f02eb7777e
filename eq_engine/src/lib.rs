//! # eq_engine
//!
//! Real-time three-band equalizer: Butterworth low-pass, band-pass and
//! high-pass filters in cascaded second-order sections, per-band gain, and
//! a per-sample peak limiter with attack/release smoothing.
//!
//! ## Signal path
//!
//! ```text
//!          ┌─ low-pass  (low_cut)            ─ × gL ─┐
//! input ───┼─ band-pass (mid_center ± bw/2)  ─ × gM ─┼─ Σ ─ limiter ─ × volume ─ clip ─ out
//!          └─ high-pass (high_cut)           ─ × gH ─┘
//! ```
//!
//! ## Threads
//!
//! | Side | Owns | Touches |
//! |---|---|---|
//! | Control | a private `EqSettings` copy | [`SharedSettings::update`] (designs filters, publishes) |
//! | Audio | [`EqualizerEngine`] filter history + limiter gain | [`SharedSettings::load`] once per block |
//!
//! The audio side never locks, allocates or logs.

pub mod error;
pub mod sos;
pub mod settings;
pub mod filter_bank;
pub mod limiter;
pub mod engine;
pub mod shared;
pub mod render;

pub use engine::{BlockOutcome, EqualizerEngine};
pub use error::{EngineError, Result};
pub use filter_bank::{BankDesign, FilterBank};
pub use limiter::Limiter;
pub use render::{RenderStats, RenderStatus, Renderer};
pub use settings::{BandEdges, BandGains, EqSettings, LimiterSettings, LimiterUpdate};
pub use shared::{SharedSettings, Snapshot};

/// `10^(db/20)`.
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}
