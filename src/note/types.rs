// Note event types produced by segmentation

use serde::{Deserialize, Serialize};

/// A discrete note carved out of the continuous pitch contour.
///
/// Invariants: `end > start`, duration at least the segmenter's minimum,
/// `frequency > 0` (intervals without usable pitch frames are discarded).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Start time in seconds from the beginning of the audio
    pub start: f64,

    /// End time in seconds (start of the next onset, or total duration)
    pub end: f64,

    /// Representative fundamental frequency in Hz (median over the interval)
    pub frequency: f64,

    /// Mean confidence of the pitch frames backing this note [0, 1]
    pub confidence: f32,
}

impl NoteEvent {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration() {
        let note = NoteEvent {
            start: 1.25,
            end: 1.75,
            frequency: 110.0,
            confidence: 0.8,
        };
        assert!((note.duration() - 0.5).abs() < 1e-12);
    }
}
