// Tempo estimation
// Derives a quantized tempo from the spacing of note onsets; the meter is
// always reported as 4/4

use serde::{Deserialize, Serialize};

use crate::fretboard::TabNote;

/// Estimated tempo with a fixed 4/4 meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoEstimate {
    /// Beats per minute, always a member of the configured palette
    pub bpm: u32,

    /// Always (4, 4); no meter detection is performed
    pub time_signature: (u8, u8),
}

/// Configuration for tempo estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempoConfig {
    /// Inter-onset intervals below this are spurious double-triggers (s)
    pub min_ioi: f64,

    /// Inter-onset intervals above this indicate missed onsets (s)
    pub max_ioi: f64,

    /// Raw estimates below this are doubled into range
    pub min_bpm: u32,

    /// Raw estimates above this are halved into range
    pub max_bpm: u32,

    /// Plausible tempos the estimate snaps to
    pub palette: Vec<u32>,

    /// Returned when no usable inter-onset interval remains
    pub fallback_bpm: u32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        TempoConfig {
            min_ioi: 0.05,
            max_ioi: 2.0,
            min_bpm: 60,
            max_bpm: 180,
            palette: vec![60, 72, 80, 88, 96, 108, 120, 132, 144, 160, 176],
            fallback_bpm: 120,
        }
    }
}

/// Estimate the tempo from inter-onset intervals of consecutive notes.
///
/// The median of the retained intervals becomes a raw bpm, octave-corrected
/// into the plausible band by doubling/halving, then snapped to the nearest
/// palette value (ties take the lower tempo). Too few usable intervals fall
/// back to the default tempo.
pub fn estimate_tempo(notes: &[TabNote], config: &TempoConfig) -> TempoEstimate {
    let fallback = TempoEstimate {
        bpm: config.fallback_bpm,
        time_signature: (4, 4),
    };

    let mut iois: Vec<f64> = notes
        .windows(2)
        .map(|pair| pair[1].start - pair[0].start)
        .filter(|&ioi| ioi >= config.min_ioi && ioi <= config.max_ioi)
        .collect();

    if iois.is_empty() {
        return fallback;
    }

    let median = median(&mut iois);
    let mut bpm = (60.0 / median).round() as u32;
    if bpm == 0 {
        return fallback;
    }

    // Octave-correct into the plausible band.
    while bpm < config.min_bpm {
        bpm *= 2;
    }
    while bpm > config.max_bpm {
        bpm /= 2;
    }

    let snapped = config
        .palette
        .iter()
        .copied()
        .min_by_key(|&tempo| (i64::from(tempo) - i64::from(bpm)).abs())
        .unwrap_or(config.fallback_bpm);

    TempoEstimate {
        bpm: snapped,
        time_signature: (4, 4),
    }
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
