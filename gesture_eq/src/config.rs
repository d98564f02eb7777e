//! Application configuration: defaults, optional TOML file, CLI overrides.

use std::path::Path;

use anyhow::{Context, Result};
use eq_engine::EqSettings;
use hand_control::mode::DEFAULT_COOLDOWN_FRAMES;
use hand_control::{CameraView, VolumeDial};
use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

/// Configuration for the full application.
///
/// ```toml
/// [audio]
/// block_size = 512
///
/// [eq.edges]
/// low_cut = 250.0
///
/// [gesture]
/// camera_view = "mirrored"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio:   AudioConfig,
    pub eq:      EqSettings,
    pub gesture: GestureConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Used when neither the input file nor the device decides.
    pub sample_rate: u32,
    /// Samples per engine block.
    pub block_size:  usize,
    /// Hand-tracking frames per second.
    pub frame_rate:  f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig {
            sample_rate: 44_100,
            block_size:  1024,
            frame_rate:  24.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub camera_view:     CameraView,
    pub cooldown_frames: u32,
    pub volume:          VolumeDial,
}

impl Default for GestureConfig {
    fn default() -> Self {
        GestureConfig {
            camera_view:     CameraView::Raw,
            cooldown_frames: DEFAULT_COOLDOWN_FRAMES,
            volume:          VolumeDial::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(text).context("invalid configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Reject values that would only fail later, deep inside a thread.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.audio.block_size > 0, "block_size must be positive");
        anyhow::ensure!(self.audio.sample_rate > 0, "sample_rate must be positive");
        anyhow::ensure!(
            self.audio.frame_rate.is_finite() && self.audio.frame_rate > 0.0,
            "frame_rate must be positive, got {}",
            self.audio.frame_rate
        );
        anyhow::ensure!(
            self.gesture.volume.span_deg.is_finite() && self.gesture.volume.span_deg > 0.0,
            "volume span must be positive"
        );
        self.eq.validate().context("invalid [eq] section")?;
        Ok(())
    }
}
