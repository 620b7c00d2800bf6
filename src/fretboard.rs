// Fretboard mapping
// Converts note frequencies to MIDI numbers and assigns each note a playable
// string/fret position in standard tuning

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::note::NoteEvent;

/// Open-string MIDI numbers in standard tuning, low to high (E A D G B E).
pub const OPEN_STRING_MIDI: [i32; 6] = [40, 45, 50, 55, 59, 64];

/// Highest playable fret.
pub const MAX_FRET: i32 = 24;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

#[derive(Debug, Error)]
pub enum FretboardError {
    #[error("cannot map non-positive or non-finite frequency {0} to a pitch")]
    InvalidFrequency(f64),
}

/// A playable position: string 6 is the low E string, string 1 the high e.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub string: u8,
    pub fret: u8,
}

/// How a position was chosen.
///
/// The tag forces callers to acknowledge the fallback path: a `Fallback`
/// position exists only because no string could reach the pitch under the
/// scoring rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fingering {
    /// Chosen by the scoring rule over all valid candidates
    Preferred(Position),
    /// Forced onto the low E string because no candidate was valid
    Fallback(Position),
}

impl Fingering {
    pub const fn position(&self) -> Position {
        match self {
            Fingering::Preferred(pos) | Fingering::Fallback(pos) => *pos,
        }
    }

    pub const fn is_fallback(&self) -> bool {
        matches!(self, Fingering::Fallback(_))
    }
}

/// A note event enriched with pitch spelling and a fretboard position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabNote {
    pub start: f64,
    pub end: f64,
    pub frequency: f64,
    pub confidence: f32,

    /// Nearest integer MIDI number for the note frequency
    pub midi: i32,

    /// Pitch name with octave, e.g. "E2" or "C#4"
    pub name: String,

    /// Assigned position; absent only for events that skipped mapping
    pub position: Option<Position>,

    /// True when the position came from the fallback rule
    pub fallback: bool,
}

impl TabNote {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Convert a frequency to the nearest integer MIDI number (A4 = 440 Hz).
///
/// Rounding is round-half-away-from-zero (`f64::round`); the rule is pinned
/// because round-half-to-even disagrees at exact .5 boundaries.
pub fn freq_to_midi(frequency: f64) -> Result<i32, FretboardError> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return Err(FretboardError::InvalidFrequency(frequency));
    }

    let midi = 69.0 + 12.0 * (frequency / 440.0).log2();
    if !midi.is_finite() {
        return Err(FretboardError::InvalidFrequency(frequency));
    }

    Ok(midi.round() as i32)
}

/// Frequency of an integer MIDI number.
pub fn midi_to_freq(midi: i32) -> f64 {
    440.0 * 2.0f64.powf((midi - 69) as f64 / 12.0)
}

/// Pitch name with octave for a MIDI number (C4 = 60).
pub fn note_name(midi: i32) -> String {
    let pitch_class = midi.rem_euclid(12) as usize;
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", NOTE_NAMES[pitch_class], octave)
}

/// Assign a string/fret position for a MIDI number.
///
/// Every string yielding a fret in [0, 24] is a candidate. The score is the
/// fret number, multiplied by 1.5 above fret 12 on the three treble strings,
/// plus 1 on the outermost strings to bias ties toward the middle. The lowest
/// score wins; ties keep the first candidate in low-to-high tuning order.
/// With no valid candidate the pitch is forced onto the low E string,
/// reduced modulo 12 into the playable range.
///
/// The choice is local and stateless: it does not consider the previous
/// note's hand position.
pub fn assign_fingering(midi: i32) -> Fingering {
    let mut best: Option<(f64, Position)> = None;

    for (i, &open) in OPEN_STRING_MIDI.iter().enumerate() {
        let fret = midi - open;
        if !(0..=MAX_FRET).contains(&fret) {
            continue;
        }

        let mut score = fret as f64;
        if i >= 3 && fret > 12 {
            score *= 1.5;
        }
        if i == 0 || i == 5 {
            score += 1.0;
        }

        let position = Position {
            string: (6 - i) as u8,
            fret: fret as u8,
        };

        match best {
            Some((best_score, _)) if score >= best_score => {}
            _ => best = Some((score, position)),
        }
    }

    match best {
        Some((_, position)) => Fingering::Preferred(position),
        None => {
            let mut fret = (midi - OPEN_STRING_MIDI[0]).max(0);
            if fret > MAX_FRET {
                fret %= 12;
            }
            Fingering::Fallback(Position {
                string: 6,
                fret: fret as u8,
            })
        }
    }
}

/// Map segmented note events to tab notes with positions.
///
/// Segmentation only emits events with positive frequency, so a non-positive
/// or non-finite frequency here is an internal numeric fault, not bad input.
pub fn map_notes(events: &[NoteEvent]) -> Result<Vec<TabNote>, FretboardError> {
    events
        .iter()
        .map(|event| {
            let midi = freq_to_midi(event.frequency)?;
            let fingering = assign_fingering(midi);

            Ok(TabNote {
                start: event.start,
                end: event.end,
                frequency: event.frequency,
                confidence: event.confidence,
                midi,
                name: note_name(midi),
                position: Some(fingering.position()),
                fallback: fingering.is_fallback(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freq_to_midi_reference_pitches() {
        assert_eq!(freq_to_midi(440.0).unwrap(), 69);
        assert_eq!(freq_to_midi(82.41).unwrap(), 40); // E2
        assert_eq!(freq_to_midi(110.0).unwrap(), 45); // A2
        assert_eq!(freq_to_midi(146.83).unwrap(), 50); // D3
        assert_eq!(freq_to_midi(196.0).unwrap(), 55); // G3
    }

    #[test]
    fn test_freq_to_midi_rejects_invalid_input() {
        assert!(freq_to_midi(0.0).is_err());
        assert!(freq_to_midi(-440.0).is_err());
        assert!(freq_to_midi(f64::NAN).is_err());
        assert!(freq_to_midi(f64::INFINITY).is_err());
    }

    #[test]
    fn test_midi_round_trip_over_guitar_range() {
        // E2 (40) up to two octaves above the high e string (88).
        for midi in 40..=88 {
            assert_eq!(freq_to_midi(midi_to_freq(midi)).unwrap(), midi);
        }
    }

    #[test]
    fn test_note_names() {
        assert_eq!(note_name(40), "E2");
        assert_eq!(note_name(45), "A2");
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(61), "C#4");
        assert_eq!(note_name(69), "A4");
    }

    #[test]
    fn test_open_strings_map_to_their_own_string() {
        let expected = [
            (40, 6), // E2 -> low E
            (45, 5), // A2
            (50, 4), // D3
            (55, 3), // G3
            (59, 2), // B3
            (64, 1), // E4 -> high e
        ];

        for (midi, string) in expected {
            let fingering = assign_fingering(midi);
            assert!(!fingering.is_fallback());
            assert_eq!(
                fingering.position(),
                Position { string, fret: 0 },
                "midi {midi}"
            );
        }
    }

    #[test]
    fn test_treble_penalty_discourages_high_positions() {
        // MIDI 70 (A#4): D string fret 20 scores 20, G string fret 15 scores
        // 22.5 with the treble multiplier, B string fret 11 scores 11, high e
        // fret 6 scores 7 with the outer-string bias. High e wins.
        let fingering = assign_fingering(70);
        assert_eq!(fingering.position(), Position { string: 1, fret: 6 });
    }

    #[test]
    fn test_fret_cost_prefers_lower_positions() {
        // MIDI 47 (B2): low E fret 7 scores 8, A string fret 2 scores 2.
        let fingering = assign_fingering(47);
        assert_eq!(fingering.position(), Position { string: 5, fret: 2 });
    }

    #[test]
    fn test_fallback_above_range_reduces_modulo_octave() {
        // MIDI 89 exceeds every string's 24th fret; the low-E fret 49 is
        // reduced to 1.
        let fingering = assign_fingering(89);
        assert!(fingering.is_fallback());
        assert_eq!(fingering.position(), Position { string: 6, fret: 1 });
    }

    #[test]
    fn test_fallback_below_range_clamps_to_open_low_e() {
        let fingering = assign_fingering(35);
        assert!(fingering.is_fallback());
        assert_eq!(fingering.position(), Position { string: 6, fret: 0 });
    }

    #[test]
    fn test_every_playable_midi_gets_a_valid_position() {
        for midi in 40..=88 {
            let fingering = assign_fingering(midi);
            let position = fingering.position();
            assert!((1..=6).contains(&position.string));
            assert!(position.fret <= MAX_FRET as u8);
            // The playable range never needs the fallback.
            assert!(!fingering.is_fallback(), "midi {midi} fell back");
        }
    }

    #[test]
    fn test_map_notes_enriches_events() {
        let events = vec![
            NoteEvent {
                start: 0.0,
                end: 0.5,
                frequency: 82.41,
                confidence: 0.9,
            },
            NoteEvent {
                start: 0.5,
                end: 1.0,
                frequency: 196.0,
                confidence: 0.8,
            },
        ];

        let notes = map_notes(&events).unwrap();

        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].midi, 40);
        assert_eq!(notes[0].name, "E2");
        assert_eq!(notes[0].position, Some(Position { string: 6, fret: 0 }));
        assert_eq!(notes[1].position, Some(Position { string: 3, fret: 0 }));
    }

    #[test]
    fn test_map_notes_propagates_invalid_frequency() {
        let events = vec![NoteEvent {
            start: 0.0,
            end: 0.5,
            frequency: f64::NAN,
            confidence: 0.5,
        }];

        assert!(map_notes(&events).is_err());
    }
}
