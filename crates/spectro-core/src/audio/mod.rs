//! PCM rendering
//!
//! The rendering engine is an external collaborator described by
//! [`AudioRenderer`] and [`RenderSession`]. [`PcmFrameSource`] drives one
//! session under a wall-clock budget; [`FileRenderer`] is a concrete engine
//! for local files (WAV via hound, everything else via Symphonia).

mod decoder;
mod file;
mod resample;
mod source;

pub use decoder::{decode_audio, AudioData};
pub use file::FileRenderer;
pub use resample::resample_interleaved;
pub use source::{PcmFrameSource, RenderBudget, RenderOutcome};

use crate::track::TrackDescriptor;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Bytes per sample of the output format (signed 16-bit big-endian)
pub const BYTES_PER_SAMPLE: usize = 2;

/// Output format of a rendering engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn nyquist(&self) -> f64 {
        f64::from(self.sample_rate) / 2.0
    }

    /// Size in bytes of one frame covering `duration` of audio
    pub fn frame_size(&self, duration: Duration) -> usize {
        let per_channel = (u128::from(self.sample_rate) * duration.as_millis() / 1000) as usize;
        per_channel.max(1) * usize::from(self.channels) * BYTES_PER_SAMPLE
    }
}

/// Result of one `provide` call on a render session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provided {
    /// Interleaved s16 big-endian PCM bytes
    Frame(Vec<u8>),
    /// Nothing buffered yet; retry after a short wait
    Pending,
    /// No more frames and no active track
    Ended,
}

/// Rendering engine able to create isolated sessions
pub trait AudioRenderer: Send + Sync {
    /// Create a session scoped to a single computation
    fn create_session(&self) -> anyhow::Result<Box<dyn RenderSession>>;

    /// PCM format every session of this engine emits
    fn output_format(&self) -> PcmFormat;
}

/// One rendering session; `destroy` must be called exactly once
pub trait RenderSession: Send {
    fn start(&mut self, track: &TrackDescriptor) -> anyhow::Result<()>;

    fn provide(&mut self) -> anyhow::Result<Provided>;

    fn destroy(&mut self);
}

/// Supported audio containers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Flac,
    Ogg,
    Mp4,
    Mkv,
    Unknown,
}

impl AudioFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("wav") | Some("wave") => AudioFormat::Wav,
            Some("mp3") => AudioFormat::Mp3,
            Some("flac") => AudioFormat::Flac,
            Some("ogg") | Some("oga") => AudioFormat::Ogg,
            Some("mp4") | Some("m4a") | Some("aac") => AudioFormat::Mp4,
            Some("mkv") | Some("mka") | Some("webm") => AudioFormat::Mkv,
            _ => AudioFormat::Unknown,
        }
    }
}
