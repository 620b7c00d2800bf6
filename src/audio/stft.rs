// Short-time spectral analysis shared by the pitch and onset stages

use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// Fixed-size short-time Fourier transform over a mono sample buffer.
///
/// Frames advance by `hop_size` samples and are windowed with a Hann window
/// before the forward FFT. The frame count for a given buffer is known up
/// front, so callers can pre-allocate their per-frame outputs.
pub struct Stft {
    fft: Arc<dyn RealToComplex<f32>>,
    window_size: usize,
    hop_size: usize,
}

impl Stft {
    pub fn new(window_size: usize, hop_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window_size);
        Stft {
            fft,
            window_size,
            hop_size,
        }
    }

    pub const fn window_size(&self) -> usize {
        self.window_size
    }

    pub const fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Number of full analysis frames in a buffer of `num_samples` samples.
    pub const fn num_frames(&self, num_samples: usize) -> usize {
        if num_samples < self.window_size || self.hop_size == 0 {
            0
        } else {
            (num_samples - self.window_size) / self.hop_size + 1
        }
    }

    /// Number of frequency bins per magnitude spectrum.
    pub const fn num_bins(&self) -> usize {
        self.window_size / 2 + 1
    }

    /// Sample offset of the start of frame `index`.
    pub const fn frame_offset(&self, index: usize) -> usize {
        index * self.hop_size
    }

    /// Pad samples with half a window of zeros on both sides so that frame
    /// `k` of the padded buffer is centered on sample `k * hop_size` of the
    /// original. Centering puts signal edges in the middle of a window,
    /// where they are actually visible to the analysis.
    pub fn pad_centered(&self, samples: &[f32]) -> Vec<f32> {
        let half = self.window_size / 2;
        let mut padded = vec![0.0; samples.len() + self.window_size];
        padded[half..half + samples.len()].copy_from_slice(samples);
        padded
    }

    /// Compute the magnitude spectrum of one frame.
    ///
    /// `frame` must hold exactly `window_size` samples.
    pub fn magnitudes(&self, frame: &[f32]) -> Vec<f32> {
        debug_assert_eq!(frame.len(), self.window_size);

        let mut windowed = frame.to_vec();
        apply_hann_window(&mut windowed);

        let mut spectrum = self.fft.make_output_vec();
        // Lengths are correct by construction, so process cannot fail.
        self.fft.process(&mut windowed, &mut spectrum).unwrap();

        spectrum.iter().map(|c| c.norm()).collect()
    }
}

/// Apply a Hann window to reduce spectral leakage.
pub fn apply_hann_window(samples: &mut [f32]) {
    let n = samples.len();
    if n == 0 {
        return;
    }

    for (i, sample) in samples.iter_mut().enumerate() {
        let window_val = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos());
        *sample *= window_val;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window_tapers_at_edges() {
        let mut samples = vec![1.0; 100];
        apply_hann_window(&mut samples);

        assert!(samples[0] < 0.1);
        assert!(samples[99] < 0.1);
        assert!(samples[50] > 0.9);
    }

    #[test]
    fn test_num_frames() {
        let stft = Stft::new(2048, 512);

        assert_eq!(stft.num_frames(0), 0);
        assert_eq!(stft.num_frames(2047), 0);
        assert_eq!(stft.num_frames(2048), 1);
        assert_eq!(stft.num_frames(2048 + 512), 2);
        assert_eq!(stft.num_frames(44100), (44100 - 2048) / 512 + 1);
    }

    #[test]
    fn test_centered_padding_yields_one_frame_per_hop() {
        let stft = Stft::new(2048, 512);
        let samples = vec![0.5; 44100];
        let padded = stft.pad_centered(&samples);

        assert_eq!(padded.len(), 44100 + 2048);
        assert_eq!(stft.num_frames(padded.len()), 44100 / 512 + 1);
        // Frame 0 of the padded buffer is centered on original sample 0.
        assert_eq!(padded[1023], 0.0);
        assert_eq!(padded[1024], 0.5);
    }

    #[test]
    fn test_magnitude_peak_at_tone_frequency() {
        let stft = Stft::new(2048, 512);
        let sample_rate = 44100.0_f32;
        let freq = 441.0_f32; // lands close to a bin center

        let frame: Vec<f32> = (0..2048)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect();

        let mags = stft.magnitudes(&frame);
        let peak_bin = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();

        let bin_width = sample_rate / 2048.0;
        let peak_freq = peak_bin as f32 * bin_width;
        assert!((peak_freq - freq).abs() < bin_width * 1.5);
    }
}
