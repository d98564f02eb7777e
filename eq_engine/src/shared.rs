//! Snapshot-and-swap settings shared between the control and audio threads.
//!
//! The control side edits a private copy of [`EqSettings`], designs any new
//! filters itself, and publishes one immutable [`Snapshot`].  The audio side
//! does a single atomic load per block and never waits on the writer.
//!
//! Replaced snapshots are parked with the writer until no reader holds them,
//! so the last reference to a snapshot (and its filter design) is always
//! released on the control side and never inside the audio callback.

use std::sync::{Arc, Mutex};

use arc_swap::{ArcSwap, Guard};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::filter_bank::BankDesign;
use crate::settings::{EqSettings, LimiterUpdate};

/// One published configuration.
#[derive(Debug)]
pub struct Snapshot {
    pub settings:          EqSettings,
    /// Filters for `settings.edges`, designed on the publishing thread.
    pub design:            Arc<BankDesign>,
    /// Bumped on every publish.
    pub generation:        u64,
    /// Bumped only when `design` changed.
    pub design_generation: u64,
}

// ════════════════════════════════════════════════════════════════════════════
// SharedSettings
// ════════════════════════════════════════════════════════════════════════════

pub struct SharedSettings {
    sample_rate: f64,
    current:     ArcSwap<Snapshot>,
    /// Serialises writers so read-modify-publish never loses an update, and
    /// holds replaced snapshots that a reader may still reference.  Readers
    /// never touch it.
    writer:      Mutex<Vec<Arc<Snapshot>>>,
}

impl SharedSettings {
    pub fn new(sample_rate: f64, settings: EqSettings) -> Result<Self> {
        settings.validate()?;
        let design = BankDesign::new(sample_rate, settings.order, &settings.edges)?;
        Ok(SharedSettings {
            sample_rate,
            current: ArcSwap::from_pointee(Snapshot {
                settings,
                design: Arc::new(design),
                generation:        1,
                design_generation: 1,
            }),
            writer: Mutex::new(Vec::new()),
        })
    }

    /// Latest snapshot.  Lock-free and allocation-free; safe on the audio
    /// thread.
    #[inline]
    pub fn load(&self) -> Guard<Arc<Snapshot>> {
        self.current.load()
    }

    /// Owned copy of the current settings.
    pub fn settings(&self) -> EqSettings {
        self.current.load().settings.clone()
    }

    pub fn sample_rate(&self) -> f64 { self.sample_rate }

    /// Edit the settings and publish the result.  When `edit` or the filter
    /// design fails nothing is published.  Filters are only redesigned when
    /// the band edges changed, and an edit that changes nothing publishes
    /// nothing.
    pub fn update(&self, edit: impl FnOnce(&mut EqSettings) -> Result<()>) -> Result<()> {
        // A poisoned lock only means another writer panicked mid-edit; the
        // published snapshot is still whole.
        let mut retired = self.writer.lock().unwrap_or_else(|e| e.into_inner());

        let current = self.current.load_full();
        let mut next = current.settings.clone();
        edit(&mut next)?;

        if next == current.settings {
            return Ok(());
        }
        if next.order != current.settings.order {
            return Err(EngineError::OrderChanged {
                fixed:     current.settings.order,
                requested: next.order,
            });
        }
        next.validate()?;

        let (design, design_generation) = if next.edges != current.settings.edges {
            let design = BankDesign::new(self.sample_rate, next.order, &next.edges)?;
            debug!(
                low_cut  = design.edges.low_cut,
                mid      = design.edges.mid_center,
                width    = design.edges.mid_bandwidth,
                high_cut = design.edges.high_cut,
                "redesigned filter bank"
            );
            (Arc::new(design), current.design_generation + 1)
        } else {
            (Arc::clone(&current.design), current.design_generation)
        };

        let next = Arc::new(Snapshot {
            settings: next,
            design,
            generation: current.generation + 1,
            design_generation,
        });
        drop(current);

        // After the swap every outstanding reader guard owns a counted
        // reference, so a count of one means only this list still holds it.
        retired.push(self.current.swap(next));
        retired.retain(|snap| Arc::strong_count(snap) > 1);
        Ok(())
    }

    // ── convenience mutators ──────────────────────────────────────────────

    pub fn set_gain(&self, low_db: Option<f32>, mid_db: Option<f32>, high_db: Option<f32>) -> Result<()> {
        self.update(|s| s.set_gain(low_db, mid_db, high_db))
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.update(|s| s.set_volume(volume))
    }

    pub fn set_low_cut(&self, hz: f64) -> Result<()> {
        self.update(|s| s.edges.set_low_cut(hz))
    }

    pub fn set_high_cut(&self, hz: f64) -> Result<()> {
        self.update(|s| s.edges.set_high_cut(hz))
    }

    pub fn set_mid_band(&self, center: Option<f64>, bandwidth: Option<f64>) -> Result<()> {
        self.update(|s| s.edges.set_mid_band(center, bandwidth))
    }

    pub fn set_limiter(&self, update: LimiterUpdate) -> Result<()> {
        self.update(|s| s.set_limiter(update))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
