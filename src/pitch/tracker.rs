// Pitch tracking
// Per-hop spectral peak picking restricted to the instrument range, with
// confidence gating to suppress spurious picks

use serde::{Deserialize, Serialize};

use crate::audio::{AudioBuffer, Stft};

/// Configuration for pitch tracking.
///
/// The gate thresholds are empirically chosen and deliberately tunable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PitchConfig {
    /// FFT window size in samples (power of 2)
    pub window_size: usize,

    /// Hop size in samples between consecutive frames
    pub hop_size: usize,

    /// Lowest candidate frequency in Hz (guitar low E with margin)
    pub fmin: f64,

    /// Highest candidate frequency in Hz
    pub fmax: f64,

    /// Below this frequency a pick needs extra confidence to survive;
    /// suppresses low-end rumble
    pub low_freq_cutoff: f64,

    /// Confidence required to keep a pick below `low_freq_cutoff`
    pub low_freq_confidence: f32,

    /// Minimum confidence for any frame to count as voiced
    pub min_confidence: f32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        PitchConfig {
            window_size: 2048,
            hop_size: 512,
            fmin: 65.0,
            fmax: 1000.0,
            low_freq_cutoff: 75.0,
            low_freq_confidence: 0.3,
            min_confidence: 0.05,
        }
    }
}

/// One fundamental-frequency estimate per analysis hop.
///
/// `frequency` is 0.0 for unvoiced frames; `confidence` is in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PitchFrame {
    pub time: f64,
    pub frequency: f64,
    pub confidence: f32,
}

impl PitchFrame {
    pub fn is_voiced(&self) -> bool {
        self.frequency > 0.0
    }
}

/// Time-ascending sequence of pitch frames at fixed hop spacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PitchTrack {
    pub frames: Vec<PitchFrame>,
    pub hop_size: usize,
    pub sample_rate: u32,
}

/// Estimate a fundamental frequency and confidence for every hop.
///
/// Analysis windows are centered on their hop position, one frame per hop
/// (frame `k` describes time `k * hop / sample_rate`). Each frame's magnitude
/// spectrum is searched for its strongest bin within [`fmin`, `fmax`]; the
/// peak frequency is refined by parabolic interpolation over log-magnitudes
/// (the raw ~21.5 Hz bin grid cannot separate adjacent semitones at the low
/// end of the guitar). Confidence is the peak magnitude normalized by the
/// strongest full-spectrum peak across all frames, so the gate thresholds are
/// independent of recording gain.
pub fn track_pitch(audio: &AudioBuffer, config: &PitchConfig) -> PitchTrack {
    let stft = Stft::new(config.window_size, config.hop_size);
    let padded = stft.pad_centered(&audio.samples);
    let num_frames = stft.num_frames(padded.len());
    let sample_rate = audio.sample_rate as f64;
    let bin_width = sample_rate / config.window_size as f64;

    let min_bin = (config.fmin / bin_width).ceil() as usize;
    let max_bin = ((config.fmax / bin_width).floor() as usize).min(stft.num_bins() - 1);

    // First pass: raw per-frame peaks plus the global normalization reference.
    let mut raw_peaks: Vec<(f64, f32)> = Vec::with_capacity(num_frames);
    let mut global_max = 0.0f32;

    for frame_idx in 0..num_frames {
        let start = stft.frame_offset(frame_idx);
        let frame = &padded[start..start + config.window_size];
        let mags = stft.magnitudes(frame);

        let frame_max = mags.iter().copied().fold(0.0f32, f32::max);
        if frame_max > global_max {
            global_max = frame_max;
        }

        let mut peak_bin = min_bin;
        let mut peak_mag = 0.0f32;
        if min_bin <= max_bin {
            for (k, &mag) in mags.iter().enumerate().take(max_bin + 1).skip(min_bin) {
                if mag > peak_mag {
                    peak_mag = mag;
                    peak_bin = k;
                }
            }
        }

        let frequency = interpolate_peak(&mags, peak_bin, bin_width);
        raw_peaks.push((frequency, peak_mag));
    }

    // Second pass: normalize confidences and gate.
    let mut frames = Vec::with_capacity(num_frames);
    for (frame_idx, &(frequency, magnitude)) in raw_peaks.iter().enumerate() {
        let confidence = if global_max > 0.0 {
            magnitude / global_max
        } else {
            0.0
        };
        let (frequency, confidence) = apply_gate(frequency, confidence, config);

        frames.push(PitchFrame {
            time: stft.frame_offset(frame_idx) as f64 / sample_rate,
            frequency,
            confidence,
        });
    }

    PitchTrack {
        frames,
        hop_size: config.hop_size,
        sample_rate: audio.sample_rate,
    }
}

/// Refine a peak bin to a fractional frequency via parabolic interpolation
/// of the log-magnitudes at the peak and its two neighbors.
fn interpolate_peak(mags: &[f32], bin: usize, bin_width: f64) -> f64 {
    if bin == 0 || bin + 1 >= mags.len() {
        return bin as f64 * bin_width;
    }

    let eps = 1e-12f64;
    let alpha = (mags[bin - 1] as f64 + eps).ln();
    let beta = (mags[bin] as f64 + eps).ln();
    let gamma = (mags[bin + 1] as f64 + eps).ln();

    let denom = alpha - 2.0 * beta + gamma;
    if !denom.is_finite() || denom.abs() < f64::EPSILON {
        return bin as f64 * bin_width;
    }

    // Vertex offset of the parabola through the three points, at most half a
    // bin away from the peak.
    let p = (0.5 * (alpha - gamma) / denom).clamp(-0.5, 0.5);
    (bin as f64 + p) * bin_width
}

/// Decide whether a raw pick counts as voiced.
///
/// Low-frequency picks need extra confidence; everything else must clear the
/// minimum confidence and sit inside the candidate range.
fn apply_gate(frequency: f64, confidence: f32, config: &PitchConfig) -> (f64, f32) {
    if frequency < config.low_freq_cutoff && confidence < config.low_freq_confidence {
        return (0.0, 0.0);
    }

    if confidence > config.min_confidence
        && frequency >= config.fmin
        && frequency <= config.fmax
    {
        (frequency, confidence)
    } else {
        (0.0, 0.0)
    }
}
