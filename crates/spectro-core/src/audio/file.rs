//! Rendering engine for local audio files

use super::{decode_audio, resample_interleaved, AudioRenderer, PcmFormat, Provided, RenderSession};
use crate::config::SpectroConfig;
use crate::track::TrackDescriptor;
use anyhow::Result;
use std::path::Path;
use std::time::Duration;

/// Decodes local files and emits fixed-duration s16 big-endian frames
///
/// A session decodes the whole file in `start`, before the first frame.
/// That time counts against the render budget; a decode that outlasts it
/// yields no frames and the computation fails instead of caching an empty
/// spectrogram.
#[derive(Debug, Clone)]
pub struct FileRenderer {
    format: PcmFormat,
    frame_duration: Duration,
}

impl FileRenderer {
    pub fn new(format: PcmFormat, frame_duration: Duration) -> Self {
        Self {
            format,
            frame_duration,
        }
    }

    pub fn from_config(config: &SpectroConfig) -> Self {
        Self::new(config.pcm_format(), config.frame_duration())
    }
}

impl AudioRenderer for FileRenderer {
    fn create_session(&self) -> Result<Box<dyn RenderSession>> {
        Ok(Box::new(FileSession {
            format: self.format,
            frame_size: self.format.frame_size(self.frame_duration),
            pcm: Vec::new(),
            cursor: 0,
            active: false,
        }))
    }

    fn output_format(&self) -> PcmFormat {
        self.format
    }
}

struct FileSession {
    format: PcmFormat,
    frame_size: usize,
    pcm: Vec<u8>,
    cursor: usize,
    active: bool,
}

impl RenderSession for FileSession {
    fn start(&mut self, track: &TrackDescriptor) -> Result<()> {
        if track.is_stream() {
            anyhow::bail!("Cannot render live stream {}", track.info.title);
        }

        let audio = decode_audio(Path::new(track.info.location()))?;
        let remixed = audio.remix(self.format.channels);
        let resampled = resample_interleaved(
            &remixed,
            usize::from(self.format.channels),
            audio.sample_rate,
            self.format.sample_rate,
        );

        self.pcm = to_s16_be(&resampled);
        self.cursor = 0;
        self.active = true;

        log::debug!(
            "Started {} ({} bytes of PCM at {}Hz x{})",
            track.info.title,
            self.pcm.len(),
            self.format.sample_rate,
            self.format.channels
        );
        Ok(())
    }

    fn provide(&mut self) -> Result<Provided> {
        if !self.active {
            return Ok(Provided::Ended);
        }
        if self.cursor >= self.pcm.len() {
            self.active = false;
            return Ok(Provided::Ended);
        }

        let end = (self.cursor + self.frame_size).min(self.pcm.len());
        let frame = self.pcm[self.cursor..end].to_vec();
        self.cursor = end;
        Ok(Provided::Frame(frame))
    }

    fn destroy(&mut self) {
        self.active = false;
        self.pcm = Vec::new();
        self.cursor = 0;
    }
}

fn to_s16_be(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&s| {
            let v = (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
            v.to_be_bytes()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackInfo;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames * usize::from(channels) {
            writer.write_sample(8192i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn file_track(path: &Path, is_stream: bool) -> TrackDescriptor {
        TrackDescriptor::new(
            TrackInfo {
                title: "fixture".to_string(),
                author: String::new(),
                length_ms: 0,
                identifier: path.display().to_string(),
                is_stream,
                uri: None,
                artwork_url: None,
                isrc: None,
            },
            "local",
        )
    }

    fn drain(session: &mut dyn RenderSession) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        while let Provided::Frame(data) = session.provide().unwrap() {
            frames.push(data);
        }
        frames
    }

    #[test]
    fn test_converts_to_output_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 1, 24000, 2400);

        let renderer = FileRenderer::new(PcmFormat::new(48000, 2), Duration::from_millis(20));
        let mut session = renderer.create_session().unwrap();
        session.start(&file_track(&path, false)).unwrap();

        let frames = drain(session.as_mut());
        let total: usize = frames.iter().map(Vec::len).sum();
        // 0.1s mono at 24kHz becomes 0.1s stereo at 48kHz
        assert_eq!(total, 4800 * 2 * 2);
        assert_eq!(frames[0].len(), 3840);
        assert_eq!(i16::from_be_bytes([frames[0][0], frames[0][1]]), 8192);

        assert_eq!(session.provide().unwrap(), Provided::Ended);
        session.destroy();
        session.destroy();
    }

    #[test]
    fn test_not_started_session_has_ended() {
        let renderer = FileRenderer::new(PcmFormat::new(48000, 2), Duration::from_millis(20));
        let mut session = renderer.create_session().unwrap();
        assert_eq!(session.provide().unwrap(), Provided::Ended);
    }

    #[test]
    fn test_rejects_streams_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FileRenderer::new(PcmFormat::new(48000, 2), Duration::from_millis(20));

        let mut session = renderer.create_session().unwrap();
        assert!(session.start(&file_track(&dir.path().join("live.wav"), true)).is_err());
        assert!(session.start(&file_track(&dir.path().join("missing.wav"), false)).is_err());
    }
}
