//! Block renderer: the piece an audio callback actually calls.
//!
//! Pulls the next block from an in-memory mono buffer, runs it through the
//! engine, then applies master volume and a hard clip.  Everything here is
//! allocation-free and lock-free once constructed; faults are counted, not
//! logged, and the control thread reads the counters.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::engine::{BlockOutcome, EqualizerEngine};
use crate::shared::SharedSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderStatus {
    Playing,
    /// Input exhausted.  The block was padded with silence.
    Complete,
    /// The stop flag was raised.  The block is silence.
    Stopped,
}

/// Counters shared with the control thread.
#[derive(Debug, Default)]
pub struct RenderStats {
    faults: AtomicU64,
    blocks: AtomicU64,
}

impl RenderStats {
    /// Blocks replaced with silence because the engine produced NaN/∞.
    pub fn faults(&self) -> u64 { self.faults.load(Ordering::Relaxed) }
    pub fn blocks(&self) -> u64 { self.blocks.load(Ordering::Relaxed) }
}

// ════════════════════════════════════════════════════════════════════════════
// Renderer
// ════════════════════════════════════════════════════════════════════════════

pub struct Renderer {
    engine:   EqualizerEngine,
    shared:   Arc<SharedSettings>,
    samples:  Arc<[f32]>,
    position: usize,
    stop:     Arc<AtomicBool>,
    stats:    Arc<RenderStats>,
}

impl Renderer {
    pub fn new(shared: Arc<SharedSettings>, samples: Arc<[f32]>) -> Self {
        Renderer {
            engine:   EqualizerEngine::for_shared(&shared),
            shared,
            samples,
            position: 0,
            stop:     Arc::new(AtomicBool::new(false)),
            stats:    Arc::new(RenderStats::default()),
        }
    }

    /// Raise to end playback at the next block boundary.
    pub fn stop_handle(&self) -> Arc<AtomicBool> { Arc::clone(&self.stop) }
    pub fn stats(&self) -> Arc<RenderStats> { Arc::clone(&self.stats) }

    pub fn position(&self) -> usize { self.position }
    pub fn len(&self) -> usize { self.samples.len() }
    pub fn is_empty(&self) -> bool { self.samples.is_empty() }

    /// Fill `out` with the next block.
    pub fn render(&mut self, out: &mut [f32]) -> RenderStatus {
        if self.stop.load(Ordering::Relaxed) {
            out.fill(0.0);
            return RenderStatus::Stopped;
        }
        self.engine.sync(&self.shared);

        let n = out.len().min(self.samples.len() - self.position);
        let (live, tail) = out.split_at_mut(n);
        live.copy_from_slice(&self.samples[self.position..self.position + n]);
        tail.fill(0.0);
        self.position += n;

        if self.engine.process(live) == BlockOutcome::Silenced {
            self.stats.faults.fetch_add(1, Ordering::Relaxed);
        }
        let volume = self.engine.settings().volume;
        for x in live.iter_mut() {
            *x = (*x * volume).clamp(-1.0, 1.0);
        }
        self.stats.blocks.fetch_add(1, Ordering::Relaxed);

        if self.position >= self.samples.len() {
            RenderStatus::Complete
        } else {
            RenderStatus::Playing
        }
    }

    /// Render the whole buffer in `block_size` steps, trimmed to the input
    /// length.  Used for offline rendering.
    pub fn render_all(&mut self, block_size: usize) -> Vec<f32> {
        let mut block = vec![0.0f32; block_size.max(1)];
        let mut out = Vec::with_capacity(self.samples.len());
        loop {
            let start  = self.position;
            let status = self.render(&mut block);
            out.extend_from_slice(&block[..self.position - start]);
            if status != RenderStatus::Playing {
                return out;
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::EqSettings;

    const FS: f64 = 44_100.0;

    fn renderer(samples: Vec<f32>) -> (Renderer, Arc<SharedSettings>) {
        let mut settings = EqSettings::default();
        settings.limiter.enabled = false;
        let shared = Arc::new(SharedSettings::new(FS, settings).unwrap());
        (Renderer::new(Arc::clone(&shared), samples.into()), shared)
    }

    #[test]
    fn end_of_input_pads_with_silence() {
        let (mut r, _) = renderer(vec![0.25; 1500]);
        let mut block = vec![1.0; 1024];
        assert_eq!(r.render(&mut block), RenderStatus::Playing);
        assert_eq!(r.render(&mut block), RenderStatus::Complete);
        assert!(block[476..].iter().all(|&x| x == 0.0));
        assert!(block[..476].iter().any(|&x| x != 0.0));

        // Already exhausted: pure silence, still complete.
        block.fill(1.0);
        assert_eq!(r.render(&mut block), RenderStatus::Complete);
        assert!(block.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn stop_flag_takes_effect_at_next_block() {
        let (mut r, _) = renderer(vec![0.25; 4096]);
        let stop = r.stop_handle();
        let mut block = vec![0.0; 256];
        assert_eq!(r.render(&mut block), RenderStatus::Playing);
        stop.store(true, Ordering::Relaxed);
        assert_eq!(r.render(&mut block), RenderStatus::Stopped);
        assert!(block.iter().all(|&x| x == 0.0));
        assert_eq!(r.position(), 256);
    }

    #[test]
    fn volume_and_clip_applied() {
        let (mut r, shared) = renderer(vec![0.5; 2048]);
        shared.set_volume(0.0).unwrap();
        let out = r.render_all(512);
        assert_eq!(out.len(), 2048);
        assert!(out.iter().all(|&x| x == 0.0));

        let (mut r, shared) = renderer(vec![0.9; 4096]);
        shared.set_gain(Some(10.0), None, None).unwrap();
        let out = r.render_all(512);
        assert!(out.iter().all(|&x| (-1.0..=1.0).contains(&x)));
        assert!(out.iter().any(|&x| x == 1.0));
    }

    #[test]
    fn non_finite_input_counted_as_fault() {
        let mut samples = vec![0.1; 2048];
        samples[700] = f32::INFINITY;
        let (mut r, _) = renderer(samples);
        let stats = r.stats();
        let out = r.render_all(1024);
        assert_eq!(stats.faults(), 1);
        assert_eq!(stats.blocks(), 2);
        assert!(out[..1024].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn empty_input_completes_immediately() {
        let (mut r, _) = renderer(Vec::new());
        assert!(r.is_empty());
        assert!(r.render_all(64).is_empty());
    }
}
