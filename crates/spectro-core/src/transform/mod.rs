//! Streaming spectral transform
//!
//! PCM bytes are decoded as s16 big-endian samples and accumulated into
//! non-overlapping windows of [`WINDOW_SIZE`] samples. Each full window is
//! Hann-tapered, transformed with a forward FFT and summarized into
//! [`BAND_COUNT`] log-spaced bands quantized to one byte each.

mod bands;

pub use bands::BandLayout;

use crate::audio::PcmFormat;
use crate::config::{ChannelMode, BAND_COUNT, WINDOW_SIZE};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Serialize, Serializer};
use std::f64::consts::PI;
use std::ops::Deref;
use std::sync::Arc;

/// Band energies of one window, one byte per band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpectralFrame([u8; BAND_COUNT]);

impl SpectralFrame {
    pub fn new(bands: [u8; BAND_COUNT]) -> Self {
        Self(bands)
    }

    pub fn as_bytes(&self) -> &[u8; BAND_COUNT] {
        &self.0
    }
}

impl Deref for SpectralFrame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for SpectralFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

/// Time-ordered spectral frames of one track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Spectrogram {
    pub frames: Vec<SpectralFrame>,
    /// Rendering stopped at the time budget before the track ended
    pub truncated: bool,
}

impl Spectrogram {
    pub fn new(frames: Vec<SpectralFrame>, truncated: bool) -> Self {
        Self { frames, truncated }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Create Hann window
pub fn hann_window(size: usize) -> Vec<f64> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (size - 1) as f64).cos()))
        .collect()
}

/// Convert a mean band power into a quantized decibel byte
pub fn quantize_power(power: f64) -> u8 {
    let db = 10.0 * (power / WINDOW_SIZE as f64 + 1e-10).log10();
    (db * 1.2).round().clamp(0.0, 255.0) as u8
}

/// Accumulates PCM and emits one [`SpectralFrame`] per full window
pub struct SpectralEngine {
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
    bands: BandLayout,
    mode: ChannelMode,
    channels: usize,
    /// Samples waiting for a full window
    buffer: Vec<i16>,
    /// Interleaved samples of a partially received frame (mixdown only)
    pending_frame: Vec<i16>,
    /// Odd byte carried over from the previous chunk
    pending_byte: Option<u8>,
    scratch: Vec<Complex<f64>>,
    fft_scratch: Vec<Complex<f64>>,
    frames: Vec<SpectralFrame>,
}

impl SpectralEngine {
    pub fn new(format: PcmFormat, mode: ChannelMode) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(WINDOW_SIZE);
        let fft_scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            fft,
            window: hann_window(WINDOW_SIZE),
            bands: BandLayout::new(format.nyquist(), WINDOW_SIZE / 2),
            mode,
            channels: usize::from(format.channels.max(1)),
            buffer: Vec::with_capacity(WINDOW_SIZE),
            pending_frame: Vec::new(),
            pending_byte: None,
            scratch: vec![Complex::new(0.0, 0.0); WINDOW_SIZE],
            fft_scratch,
            frames: Vec::new(),
        }
    }

    /// Feed raw interleaved s16 big-endian bytes
    pub fn push_bytes(&mut self, mut bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if let Some(hi) = self.pending_byte.take() {
            self.push_sample(i16::from_be_bytes([hi, bytes[0]]));
            bytes = &bytes[1..];
        }

        let mut pairs = bytes.chunks_exact(2);
        for pair in &mut pairs {
            self.push_sample(i16::from_be_bytes([pair[0], pair[1]]));
        }
        if let [last] = pairs.remainder() {
            self.pending_byte = Some(*last);
        }
    }

    /// Feed already decoded interleaved samples
    pub fn push_samples(&mut self, samples: &[i16]) {
        for &sample in samples {
            self.push_sample(sample);
        }
    }

    fn push_sample(&mut self, sample: i16) {
        match self.mode {
            ChannelMode::Interleaved => self.push_window_sample(sample),
            ChannelMode::Mixdown => {
                self.pending_frame.push(sample);
                if self.pending_frame.len() == self.channels {
                    let sum: i32 = self.pending_frame.iter().map(|&s| i32::from(s)).sum();
                    self.pending_frame.clear();
                    self.push_window_sample((sum / self.channels as i32) as i16);
                }
            }
        }
    }

    fn push_window_sample(&mut self, sample: i16) {
        self.buffer.push(sample);
        if self.buffer.len() == WINDOW_SIZE {
            let frame = self.process_window();
            self.frames.push(frame);
            self.buffer.clear();
        }
    }

    fn process_window(&mut self) -> SpectralFrame {
        for ((slot, &sample), &w) in self.scratch.iter_mut().zip(&self.buffer).zip(&self.window) {
            *slot = Complex::new(f64::from(sample) * w, 0.0);
        }

        self.fft.process_with_scratch(&mut self.scratch, &mut self.fft_scratch);

        let magnitudes: Vec<f64> = self.scratch[..WINDOW_SIZE / 2].iter().map(|c| c.norm()).collect();
        self.bands.quantize(&magnitudes)
    }

    /// Frames produced so far
    pub fn frames(&self) -> &[SpectralFrame] {
        &self.frames
    }

    /// Samples waiting for the next window
    pub fn buffered_samples(&self) -> usize {
        self.buffer.len()
    }

    /// Consume the engine; samples short of a full window are dropped
    pub fn finish(self) -> Vec<SpectralFrame> {
        if !self.buffer.is_empty() {
            log::debug!("Dropping {} trailing samples below a full window", self.buffer.len());
        }
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const FORMAT: PcmFormat = PcmFormat {
        sample_rate: 48000,
        channels: 1,
    };

    fn sine(freq: f64, amplitude: f64, len: usize, sample_rate: u32) -> Vec<i16> {
        (0..len)
            .map(|i| {
                let t = i as f64 / f64::from(sample_rate);
                (amplitude * (2.0 * PI * freq * t).sin()).round() as i16
            })
            .collect()
    }

    fn to_be_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_be_bytes()).collect()
    }

    #[test]
    fn test_hann_window() {
        let window = hann_window(WINDOW_SIZE);
        assert_eq!(window.len(), WINDOW_SIZE);
        assert_abs_diff_eq!(window[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(window[WINDOW_SIZE - 1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(window[WINDOW_SIZE / 2], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_quantize_power() {
        assert_eq!(quantize_power(0.0), 0);
        // 10 * log10(1000) * 1.2 = 36
        assert_eq!(quantize_power(1000.0 * WINDOW_SIZE as f64), 36);
        assert_eq!(quantize_power(f64::MAX), 255);
    }

    #[test]
    fn test_frame_count_drops_partial_window() {
        let mut engine = SpectralEngine::new(FORMAT, ChannelMode::Interleaved);
        let samples = sine(440.0, 8000.0, WINDOW_SIZE * 5 + 100, 48000);
        engine.push_bytes(&to_be_bytes(&samples));

        assert_eq!(engine.buffered_samples(), 100);
        assert_eq!(engine.finish().len(), 5);
    }

    #[test]
    fn test_short_input_yields_no_frames() {
        let mut engine = SpectralEngine::new(FORMAT, ChannelMode::Interleaved);
        engine.push_samples(&vec![1000; WINDOW_SIZE - 1]);
        assert!(engine.finish().is_empty());
    }

    #[test]
    fn test_silence_hits_minimum() {
        let mut engine = SpectralEngine::new(FORMAT, ChannelMode::Interleaved);
        engine.push_bytes(&vec![0u8; WINDOW_SIZE * 2 * 3]);

        let frames = engine.finish();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.iter().all(|&b| b == 0)));
    }

    #[test]
    fn test_odd_chunks_match_whole_stream() {
        let bytes = to_be_bytes(&sine(1000.0, 12000.0, WINDOW_SIZE * 2, 48000));

        let mut whole = SpectralEngine::new(FORMAT, ChannelMode::Interleaved);
        whole.push_bytes(&bytes);

        let mut split = SpectralEngine::new(FORMAT, ChannelMode::Interleaved);
        for chunk in bytes.chunks(777) {
            split.push_bytes(chunk);
        }

        assert_eq!(whole.finish(), split.finish());
    }

    #[test]
    fn test_big_endian_decoding() {
        let samples = sine(3000.0, 10000.0, WINDOW_SIZE, 48000);

        let mut from_bytes = SpectralEngine::new(FORMAT, ChannelMode::Interleaved);
        from_bytes.push_bytes(&to_be_bytes(&samples));

        let mut from_samples = SpectralEngine::new(FORMAT, ChannelMode::Interleaved);
        from_samples.push_samples(&samples);

        assert_eq!(from_bytes.finish(), from_samples.finish());
    }

    #[test]
    fn test_tone_peaks_in_matching_band() {
        let layout = BandLayout::new(FORMAT.nyquist(), WINDOW_SIZE / 2);
        let target = 40;
        let freq = layout.center_frequency(target);

        let mut engine = SpectralEngine::new(FORMAT, ChannelMode::Interleaved);
        engine.push_samples(&sine(freq, 10000.0, WINDOW_SIZE * 2, 48000));
        let frames = engine.finish();
        assert_eq!(frames.len(), 2);

        for frame in &frames {
            let peak = frame[target];
            assert!(peak > 0);
            for (band, &value) in frame.iter().enumerate() {
                if band.abs_diff(target) >= 8 {
                    assert!(peak > value, "band {} ({}) >= target band ({})", band, value, peak);
                }
            }
        }
    }

    #[test]
    fn test_mixdown_halves_sample_count() {
        let stereo = PcmFormat::new(48000, 2);

        let mut interleaved = SpectralEngine::new(stereo, ChannelMode::Interleaved);
        interleaved.push_samples(&vec![500; WINDOW_SIZE * 2]);
        assert_eq!(interleaved.finish().len(), 2);

        let mut mixdown = SpectralEngine::new(stereo, ChannelMode::Mixdown);
        mixdown.push_samples(&vec![500; WINDOW_SIZE * 2]);
        assert_eq!(mixdown.finish().len(), 1);
    }

    #[test]
    fn test_mixdown_recovers_per_channel_tone() {
        let stereo = PcmFormat::new(48000, 2);
        let layout = BandLayout::new(stereo.nyquist(), WINDOW_SIZE / 2);
        let target = 40;
        let mono = sine(layout.center_frequency(target), 10000.0, WINDOW_SIZE, 48000);
        let dual: Vec<i16> = mono.iter().flat_map(|&s| [s, s]).collect();

        let mut engine = SpectralEngine::new(stereo, ChannelMode::Mixdown);
        engine.push_samples(&dual);
        let mixed = engine.finish();

        let mut reference = SpectralEngine::new(stereo, ChannelMode::Interleaved);
        reference.push_samples(&mono);
        assert_eq!(mixed, reference.finish());
    }

    #[test]
    fn test_spectral_frame_access() {
        let mut bands = [0u8; BAND_COUNT];
        bands[0] = 7;
        let spectrogram = Spectrogram::new(vec![SpectralFrame::new(bands)], false);
        assert_eq!(spectrogram.len(), 1);
        assert_eq!(spectrogram.frames[0].as_bytes()[0], 7);
        assert_eq!(spectrogram.frames[0].len(), BAND_COUNT);
    }
}
