//! Log-spaced band layout over FFT magnitude bins

use super::{quantize_power, SpectralFrame};
use crate::config::{BAND_COUNT, MIN_BAND_FREQ};
use std::ops::Range;

/// Upper edge of a band relative to its center frequency
const BAND_SPAN: f64 = 1.2;

/// Precomputed bin range of every band
#[derive(Debug, Clone, PartialEq)]
pub struct BandLayout {
    nyquist: f64,
    ranges: Vec<Range<usize>>,
}

impl BandLayout {
    /// Lay out [`BAND_COUNT`] bands between 20 Hz and `nyquist` over `mag_count` bins
    pub fn new(nyquist: f64, mag_count: usize) -> Self {
        let mag_count = mag_count.max(1);
        let ranges = (0..BAND_COUNT)
            .map(|band| {
                let freq = band_frequency(band, nyquist);
                let start = ((freq * mag_count as f64 / nyquist) as usize).min(mag_count - 1);
                let end = ((freq * BAND_SPAN * mag_count as f64 / nyquist) as usize).clamp(start + 1, mag_count);
                start..end
            })
            .collect();

        Self { nyquist, ranges }
    }

    /// Target frequency of `band` in Hz
    pub fn center_frequency(&self, band: usize) -> f64 {
        band_frequency(band, self.nyquist)
    }

    pub fn range(&self, band: usize) -> Range<usize> {
        self.ranges[band].clone()
    }

    /// Reduce half-spectrum magnitudes to one quantized byte per band
    pub fn quantize(&self, magnitudes: &[f64]) -> SpectralFrame {
        let mut bands = [0u8; BAND_COUNT];
        for (slot, range) in bands.iter_mut().zip(&self.ranges) {
            let bins = &magnitudes[range.start.min(magnitudes.len())..range.end.min(magnitudes.len())];
            let power = if bins.is_empty() {
                0.0
            } else {
                bins.iter().map(|m| m * m).sum::<f64>() / bins.len() as f64
            };
            *slot = quantize_power(power);
        }
        SpectralFrame::new(bands)
    }
}

fn band_frequency(band: usize, nyquist: f64) -> f64 {
    let log_min = MIN_BAND_FREQ.ln();
    let log_max = nyquist.ln();
    (log_min + (log_max - log_min) * band as f64 / (BAND_COUNT - 1) as f64).exp()
}
