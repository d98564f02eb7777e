//! Real-time audio output.
//!
//! The cpal callback owns a [`Renderer`] and pulls fixed-size engine blocks
//! through a [`BlockFeeder`], whatever buffer size the device asks for.
//! Playback stops cooperatively: [`Player::stop`] raises a flag the
//! renderer checks once per block.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use eq_engine::{RenderStats, RenderStatus, Renderer};
use tracing::{error, info, warn};

// ════════════════════════════════════════════════════════════════════════════
// BlockFeeder: device buffers from fixed engine blocks
// ════════════════════════════════════════════════════════════════════════════

/// Adapts the renderer's fixed block size to arbitrary device buffers and
/// fans mono out to every channel.
pub struct BlockFeeder {
    renderer: Renderer,
    block:    Vec<f32>,
    cursor:   usize,
    finished: Arc<AtomicBool>,
}

impl BlockFeeder {
    pub fn new(renderer: Renderer, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        BlockFeeder {
            renderer,
            block:    vec![0.0; block_size],
            // Empty: the first sample pulls a fresh block.
            cursor:   block_size,
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Raised once the input is exhausted or playback was stopped.
    pub fn finished_flag(&self) -> Arc<AtomicBool> { Arc::clone(&self.finished) }

    #[inline]
    fn next_sample(&mut self) -> f32 {
        if self.cursor == self.block.len() {
            if self.renderer.render(&mut self.block) != RenderStatus::Playing {
                self.finished.store(true, Ordering::Relaxed);
            }
            self.cursor = 0;
        }
        let x = self.block[self.cursor];
        self.cursor += 1;
        x
    }

    /// Fill an interleaved device buffer.
    pub fn fill<T>(&mut self, data: &mut [T], channels: usize)
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        for frame in data.chunks_mut(channels.max(1)) {
            let value = T::from_sample(self.next_sample());
            for out in frame.iter_mut() {
                *out = value;
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// OutputDevice
// ════════════════════════════════════════════════════════════════════════════

/// The default output device and the stream format chosen for it.
pub struct OutputDevice {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
}

impl OutputDevice {
    /// Open the default output, preferring `preferred_rate` (usually the
    /// input file's rate) when the device supports it.
    pub fn open_default(preferred_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        info!(host = ?host.id(), "audio host");

        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("no audio output device found"))?;
        info!(device = %device.name().unwrap_or_else(|_| "unknown".into()), "audio device");

        let wanted = cpal::SampleRate(preferred_rate);
        let matching = device
            .supported_output_configs()
            .context("querying output configs")?
            .filter(|range| range.min_sample_rate() <= wanted && wanted <= range.max_sample_rate())
            .max_by_key(|range| range.sample_format() == cpal::SampleFormat::F32)
            .map(|range| range.with_sample_rate(wanted));

        let config = match matching {
            Some(config) => config,
            None => {
                let config = device.default_output_config().context("default output config")?;
                warn!(
                    wanted = preferred_rate,
                    using  = config.sample_rate().0,
                    "device does not support the input rate; playback pitch will shift"
                );
                config
            }
        };
        Ok(OutputDevice { device, config })
    }

    pub fn sample_rate(&self) -> u32 { self.config.sample_rate().0 }
    pub fn channels(&self) -> usize { self.config.channels() as usize }
}

// ════════════════════════════════════════════════════════════════════════════
// Player
// ════════════════════════════════════════════════════════════════════════════

/// Handle to a running output stream.  Dropping it closes the stream.
pub struct Player {
    _stream:  cpal::Stream,
    stop:     Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    stats:    Arc<RenderStats>,
}

impl Player {
    pub fn start(output: OutputDevice, renderer: Renderer, block_size: usize) -> Result<Self> {
        let stop  = renderer.stop_handle();
        let stats = renderer.stats();
        let feeder = BlockFeeder::new(renderer, block_size);
        let finished = feeder.finished_flag();

        let channels = output.channels();
        let format   = output.config.sample_format();
        let config: cpal::StreamConfig = output.config.into();

        let stream = match format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&output.device, &config, feeder, channels),
            cpal::SampleFormat::I16 => build_stream::<i16>(&output.device, &config, feeder, channels),
            cpal::SampleFormat::U16 => build_stream::<u16>(&output.device, &config, feeder, channels),
            other => return Err(anyhow!("unsupported sample format {:?}", other)),
        }?;
        stream.play().context("starting audio stream")?;
        info!(rate = config.sample_rate.0, channels, block_size, "audio stream started");

        Ok(Player { _stream: stream, stop, finished, stats })
    }

    /// Silence from the next block on.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool { self.finished.load(Ordering::Relaxed) }
    pub fn stats(&self) -> &Arc<RenderStats> { &self.stats }
}

fn build_stream<T>(
    device:     &cpal::Device,
    config:     &cpal::StreamConfig,
    mut feeder: BlockFeeder,
    channels:   usize,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| feeder.fill(data, channels),
            |err| error!("audio stream error: {}", err),
            None,
        )
        .context("building output stream")?;
    Ok(stream)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
