//! Spectro Core - cached log-band spectrograms for encoded tracks
//!
//! A track identifier (base64 track message) is resolved into a descriptor,
//! rendered to PCM by an [`audio::AudioRenderer`], cut into fixed windows and
//! reduced to [`BAND_COUNT`] quantized bands per window. Results are cached
//! per identifier for the life of the process.

pub mod audio;
pub mod cache;
pub mod config;
pub mod service;
pub mod track;
pub mod transform;

pub use audio::{AudioRenderer, FileRenderer, PcmFormat, PcmFrameSource, RenderBudget, RenderOutcome};
pub use cache::SpectrogramCache;
pub use config::{ChannelMode, SpectroConfig, BAND_COUNT, WINDOW_SIZE};
pub use service::{compute_spectrogram, SpectrogramOutcome, SpectrogramService, UnavailableReason};
pub use track::{MessageTrackCodec, TrackCodec, TrackDescriptor, TrackInfo, TrackResolver};
pub use transform::{SpectralEngine, SpectralFrame, Spectrogram};

use std::sync::Arc;

/// Build a service that renders local files and decodes track messages
pub fn local_service(config: SpectroConfig) -> anyhow::Result<SpectrogramService> {
    config.validate()?;
    let codec = Arc::new(MessageTrackCodec::new(&config.codec));
    let renderer = Arc::new(FileRenderer::from_config(&config));
    Ok(SpectrogramService::new(codec, renderer, config))
}
