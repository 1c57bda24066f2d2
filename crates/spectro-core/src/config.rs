//! Configuration for the spectrogram pipeline
//!
//! Window size and band count are compile-time constants. Everything that
//! shapes timing or the renderer output format lives in [`SpectroConfig`],
//! loadable from TOML.

use crate::audio::PcmFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Number of samples per FFT window
pub const WINDOW_SIZE: usize = 2048;

/// Number of log-spaced bands per spectral frame
pub const BAND_COUNT: usize = 64;

/// Lowest band frequency in Hz
pub const MIN_BAND_FREQ: f64 = 20.0;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SpectroConfig {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub codec: CodecConfig,
}

/// Renderer output format (signed 16-bit big-endian, interleaved)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
    #[serde(default = "default_frame_duration_ms")]
    pub frame_duration_ms: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            frame_duration_ms: default_frame_duration_ms(),
        }
    }
}

fn default_sample_rate() -> u32 {
    48000
}
fn default_channels() -> u16 {
    2
}
fn default_frame_duration_ms() -> u32 {
    20
}

/// Wall-clock budget and polling cadence for one computation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderConfig {
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            timeout_s: default_timeout_s(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_timeout_s() -> u64 {
    120
}
fn default_poll_interval_ms() -> u64 {
    5
}

/// How interleaved channels are fed to the spectral engine
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    /// Treat the whole interleaved stream as one scalar sequence
    #[default]
    Interleaved,
    /// Average each interleaved frame into a single sample
    Mixdown,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub channel_mode: ChannelMode,
}

/// Source names the track codec accepts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CodecConfig {
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
        }
    }
}

fn default_sources() -> Vec<String> {
    vec!["local".to_string(), "http".to_string()]
}

impl SpectroConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        let config: SpectroConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML config: {}", e))?;
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.output.sample_rate == 0 {
            anyhow::bail!("Sample rate must be > 0");
        }
        if f64::from(self.output.sample_rate) / 2.0 <= MIN_BAND_FREQ {
            anyhow::bail!("Nyquist frequency must be above {} Hz", MIN_BAND_FREQ);
        }
        if self.output.channels == 0 {
            anyhow::bail!("Channel count must be > 0");
        }
        if self.output.frame_duration_ms == 0 {
            anyhow::bail!("frame_duration_ms must be > 0");
        }
        if self.render.timeout_s == 0 {
            anyhow::bail!("Render timeout must be > 0");
        }
        if self.render.poll_interval_ms == 0 {
            anyhow::bail!("Poll interval must be > 0");
        }
        Ok(())
    }

    pub fn pcm_format(&self) -> PcmFormat {
        PcmFormat::new(self.output.sample_rate, self.output.channels)
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(u64::from(self.output.frame_duration_ms))
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render.timeout_s)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.render.poll_interval_ms)
    }
}
