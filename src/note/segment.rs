// Onset detection and note segmentation
// Builds an onset-strength envelope from spectral flux, picks onsets with an
// adaptive threshold, and aggregates pitch frames into discrete note events

use serde::{Deserialize, Serialize};

use crate::audio::{AudioBuffer, Stft};
use crate::note::NoteEvent;
use crate::pitch::PitchTrack;

/// Absolute power floor for the dB-scale spectra; silence sits at this floor.
const POWER_FLOOR: f32 = 1e-10;

/// Band powers more than 80 dB below the loudest band clamp to a common
/// floor, so inaudible leakage ripple never looks like spectral change.
const DYNAMIC_RANGE: f32 = 1e-8;

/// Configuration for onset detection and segmentation.
///
/// Window widths are in hops; the thresholds are empirically chosen and
/// deliberately tunable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnsetConfig {
    /// FFT window size in samples (power of 2)
    pub window_size: usize,

    /// Hop size in samples between consecutive frames
    pub hop_size: usize,

    /// Number of frequency bands the spectrum is folded into before the
    /// median aggregation
    pub bands: usize,

    /// Hops before a candidate that it must dominate
    pub pre_max: usize,

    /// Hops after a candidate that it must dominate
    pub post_max: usize,

    /// Hops before a candidate contributing to the local mean
    pub pre_avg: usize,

    /// Hops after a candidate contributing to the local mean
    pub post_avg: usize,

    /// Margin above the local mean a candidate must clear
    pub delta: f32,

    /// Minimum spacing between accepted onsets, in hops
    pub wait: usize,

    /// Accepted onsets closer than this to the previous one are dropped (s)
    pub min_onset_gap: f64,

    /// Intervals shorter than this never become notes (s)
    pub min_note_duration: f64,

    /// Pitch frames below this confidence do not contribute to a note
    pub min_frame_confidence: f32,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        OnsetConfig {
            window_size: 2048,
            hop_size: 512,
            bands: 128,
            pre_max: 5,
            post_max: 5,
            pre_avg: 10,
            post_avg: 10,
            delta: 0.2,
            wait: 30,
            min_onset_gap: 0.05,
            min_note_duration: 0.05,
            min_frame_confidence: 0.1,
        }
    }
}

/// Aggregate the pitch track into discrete note events between onsets.
///
/// Consecutive onsets bound candidate intervals; the last interval ends at
/// the buffer's total duration. Intervals shorter than the minimum duration,
/// or without any usable pitch frame, are discarded — silence degrades to an
/// empty result rather than an error.
pub fn segment_notes(
    audio: &AudioBuffer,
    track: &PitchTrack,
    config: &OnsetConfig,
) -> Vec<NoteEvent> {
    let envelope = onset_strength(audio, config);
    let peaks = pick_onsets(&envelope, config);
    let starts = backtrack_to_minimum(&peaks, &envelope);

    let hop_secs = config.hop_size as f64 / audio.sample_rate as f64;

    // Drop onsets too close to the previous accepted one.
    let mut onset_times: Vec<f64> = Vec::with_capacity(starts.len());
    for &frame in &starts {
        let t = frame as f64 * hop_secs;
        match onset_times.last() {
            Some(&prev) if t - prev < config.min_onset_gap => {}
            _ => onset_times.push(t),
        }
    }

    log::debug!(
        "{} onset candidates, {} after spacing filter",
        peaks.len(),
        onset_times.len()
    );

    let total_duration = audio.duration_secs();
    let mut notes = Vec::with_capacity(onset_times.len());

    for (i, &start) in onset_times.iter().enumerate() {
        let end = if i + 1 < onset_times.len() {
            onset_times[i + 1]
        } else {
            total_duration
        };

        if end - start < config.min_note_duration {
            continue;
        }

        let mut frequencies = Vec::new();
        let mut confidences = Vec::new();
        for frame in &track.frames {
            if frame.time >= start
                && frame.time < end
                && frame.is_voiced()
                && frame.confidence > config.min_frame_confidence
            {
                frequencies.push(frame.frequency);
                confidences.push(frame.confidence);
            }
        }

        // No usable pitch in the interval: silence or noise, not a note.
        if frequencies.is_empty() {
            continue;
        }

        // Median frequency is robust against octave-jump outliers.
        let frequency = median_f64(&mut frequencies);
        let confidence = confidences.iter().sum::<f32>() / confidences.len() as f32;

        notes.push(NoteEvent {
            start,
            end,
            frequency,
            confidence,
        });
    }

    notes
}

/// Onset-strength envelope: per hop, the median across frequency bands of
/// the positive frame-to-frame increase in band power (dB).
///
/// Analysis windows are centered on their hop position, so signal edges fall
/// in the middle of a window where they splatter broadband energy the median
/// can see. Band powers are clamped 80 dB below the loudest band before the
/// comparison. The frame before the signal is taken as silence, so a note
/// starting at sample zero still registers an energy increase.
fn onset_strength(audio: &AudioBuffer, config: &OnsetConfig) -> Vec<f32> {
    let stft = Stft::new(config.window_size, config.hop_size);
    let padded = stft.pad_centered(&audio.samples);
    let num_frames = stft.num_frames(padded.len());
    let num_bands = config.bands.clamp(1, stft.num_bins());

    // Band powers for every frame, plus the loudest band as dB reference.
    let mut band_powers: Vec<Vec<f32>> = Vec::with_capacity(num_frames);
    let mut max_power = 0.0f32;

    for frame_idx in 0..num_frames {
        let start = stft.frame_offset(frame_idx);
        let frame = &padded[start..start + config.window_size];
        let mags = stft.magnitudes(frame);

        let bands = band_power(&mags, num_bands);
        for &power in &bands {
            if power > max_power {
                max_power = power;
            }
        }
        band_powers.push(bands);
    }

    let floor = (max_power * DYNAMIC_RANGE).max(POWER_FLOOR);
    let floor_db = 10.0 * floor.log10();

    let mut envelope = Vec::with_capacity(num_frames);
    let mut prev_db = vec![floor_db; num_bands];
    let mut diffs = vec![0.0f32; num_bands];

    for bands in &band_powers {
        let db: Vec<f32> = bands
            .iter()
            .map(|&power| 10.0 * power.max(floor).log10())
            .collect();

        for (k, d) in diffs.iter_mut().enumerate() {
            *d = (db[k] - prev_db[k]).max(0.0);
        }
        envelope.push(median_f32(&mut diffs));

        prev_db = db;
    }

    envelope
}

/// Fold a magnitude spectrum into `num_bands` contiguous power bands.
fn band_power(mags: &[f32], num_bands: usize) -> Vec<f32> {
    let band_size = (mags.len() / num_bands).max(1);
    let mut bands = vec![0.0f32; num_bands];

    for (k, &mag) in mags.iter().enumerate() {
        let band = (k / band_size).min(num_bands - 1);
        bands[band] += mag * mag;
    }

    bands
}

/// Pick onset candidates from the envelope with an adaptive threshold.
///
/// A hop qualifies when it is the maximum of its `pre_max`/`post_max`
/// neighborhood, clears the mean of its `pre_avg`/`post_avg` surroundings by
/// `delta`, and lies at least `wait` hops after the previous accepted onset.
fn pick_onsets(envelope: &[f32], config: &OnsetConfig) -> Vec<usize> {
    let n = envelope.len();
    let mut onsets = Vec::new();
    let mut last_onset: Option<usize> = None;

    for i in 0..n {
        if let Some(last) = last_onset {
            if i - last < config.wait {
                continue;
            }
        }

        let max_lo = i.saturating_sub(config.pre_max);
        let max_hi = (i + config.post_max + 1).min(n);
        let window_max = envelope[max_lo..max_hi]
            .iter()
            .copied()
            .fold(f32::MIN, f32::max);
        if envelope[i] < window_max {
            continue;
        }

        let avg_lo = i.saturating_sub(config.pre_avg);
        let avg_hi = (i + config.post_avg + 1).min(n);
        let window = &envelope[avg_lo..avg_hi];
        let mean = window.iter().sum::<f32>() / window.len() as f32;
        if envelope[i] < mean + config.delta {
            continue;
        }

        onsets.push(i);
        last_onset = Some(i);
    }

    onsets
}

/// Move each onset back to the nearest preceding local minimum of the
/// envelope for a more accurate note start. Frame 0 counts as a minimum.
fn backtrack_to_minimum(onsets: &[usize], envelope: &[f32]) -> Vec<usize> {
    let mut minima = vec![0usize];
    for m in 1..envelope.len().saturating_sub(1) {
        if envelope[m] <= envelope[m - 1] && envelope[m] < envelope[m + 1] {
            minima.push(m);
        }
    }

    onsets
        .iter()
        .map(|&onset| match minima.binary_search(&onset) {
            Ok(i) => minima[i],
            Err(i) => minima[i - 1],
        })
        .collect()
}

fn median_f32(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn median_f64(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
