//! Sample-rate conversion using linear interpolation

/// Resample interleaved audio to `to_rate`, interpolating each channel separately
pub fn resample_interleaved(samples: &[f32], channels: usize, from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || channels == 0 || samples.is_empty() {
        return samples.to_vec();
    }

    let frames = samples.len() / channels;
    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let output_frames = (frames as f64 / ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_frames * channels);

    for i in 0..output_frames {
        let src_pos = i as f64 * ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        if src_idx + 1 < frames {
            for ch in 0..channels {
                let a = samples[src_idx * channels + ch];
                let b = samples[(src_idx + 1) * channels + ch];
                output.push(a * (1.0 - frac) + b * frac);
            }
        } else if src_idx < frames {
            output.extend_from_slice(&samples[src_idx * channels..(src_idx + 1) * channels]);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_rate() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_interleaved(&samples, 1, 44100, 44100), samples);
    }

    #[test]
    fn test_upsample_keeps_channels_apart() {
        // Left ramps up, right stays constant
        let samples = vec![0.0, 1.0, 1.0, 1.0];
        let out = resample_interleaved(&samples, 2, 1, 2);
        assert_eq!(out.len(), 8);
        assert_relative_eq!(out[2], 0.5);
        assert_relative_eq!(out[3], 1.0);
    }

    #[test]
    fn test_downsample_length() {
        let samples = vec![0.0; 48000];
        let out = resample_interleaved(&samples, 1, 48000, 16000);
        assert_eq!(out.len(), 16000);
    }
}
