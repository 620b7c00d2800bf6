// Pipeline orchestration
// Runs the analysis stages strictly in sequence over a decoded audio buffer:
// pitch tracking, segmentation, fretboard mapping, tempo estimation, layout

pub mod trace;

pub use trace::{read_trace, TraceEntry, TraceError, TraceWriter};

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::audio::{self, AudioBuffer, AudioError};
use crate::fretboard::{self, TabNote};
use crate::note::{self, NoteEvent, OnsetConfig};
use crate::pitch::{self, PitchConfig};
use crate::tab::{self, LayoutConfig, TabDocument};
use crate::tempo::{self, TempoConfig, TempoEstimate};

pub const DEFAULT_TITLE: &str = "Guitar Tablature";

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input could not be decoded into usable audio. Surfaced to the
    /// client; retrying the same input cannot succeed.
    #[error("unsupported or corrupt audio: {0}")]
    Audio(#[from] AudioError),

    /// An unexpected numeric fault inside the analysis stages. Surfaced as a
    /// server error and logged with context before returning.
    #[error("internal processing error: {0}")]
    Internal(String),
}

/// Per-stage configuration, with defaults matching the tuned constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeConfig {
    /// Title rendered in the document header
    pub title: String,

    pub pitch: PitchConfig,
    pub onset: OnsetConfig,
    pub tempo: TempoConfig,
    pub layout: LayoutConfig,
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        TranscribeConfig {
            title: DEFAULT_TITLE.to_string(),
            pitch: PitchConfig::default(),
            onset: OnsetConfig::default(),
            tempo: TempoConfig::default(),
            layout: LayoutConfig::default(),
        }
    }
}

/// Everything the pipeline produces for one recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcription {
    pub notes: Vec<TabNote>,
    pub tempo: TempoEstimate,
    pub document: TabDocument,
}

impl Transcription {
    /// True when no note survived segmentation: silent or empty-sounding
    /// input. Not an error; the document is valid but blank.
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Transcribe a decoded audio buffer into tablature.
pub fn transcribe(
    audio: &AudioBuffer,
    config: &TranscribeConfig,
) -> Result<Transcription, PipelineError> {
    transcribe_with_trace(audio, config, None)
}

/// Transcribe, optionally appending a JSONL trace entry per stage.
pub fn transcribe_with_trace(
    audio: &AudioBuffer,
    config: &TranscribeConfig,
    trace: Option<&TraceWriter>,
) -> Result<Transcription, PipelineError> {
    log::info!("transcribing {:.2}s of audio", audio.duration_secs());

    let track = pitch::track_pitch(audio, &config.pitch);
    log::info!("tracked pitch over {} frames", track.frames.len());
    record(
        trace,
        TraceEntry::with_count("pitch_tracking", "pitch track computed", track.frames.len()),
    );

    let events = note::segment_notes(audio, &track, &config.onset);
    log::info!("segmented {} note events", events.len());
    record(
        trace,
        TraceEntry::with_count("segmentation", "note events segmented", events.len()),
    );

    validate_events(&events)?;

    let notes = fretboard::map_notes(&events).map_err(|e| {
        log::error!("fretboard mapping failed: {e}");
        PipelineError::Internal(e.to_string())
    })?;
    record(
        trace,
        TraceEntry::with_count("fretboard_mapping", "positions assigned", notes.len()),
    );

    let tempo_estimate = tempo::estimate_tempo(&notes, &config.tempo);
    log::info!("estimated tempo: {} bpm", tempo_estimate.bpm);
    record(
        trace,
        TraceEntry::new(
            "tempo_estimation",
            format!("estimated {} bpm", tempo_estimate.bpm),
        ),
    );

    if notes.is_empty() {
        log::warn!("no notes survived segmentation; producing an empty document");
    }

    let document = tab::build_document(&config.title, &notes, &tempo_estimate, &config.layout);
    record(
        trace,
        TraceEntry::with_count("layout", "document laid out", document.pages.len()),
    );

    Ok(Transcription {
        notes,
        tempo: tempo_estimate,
        document,
    })
}

/// Ingest an audio file and transcribe it.
pub fn transcribe_path(
    path: &Path,
    config: &TranscribeConfig,
) -> Result<Transcription, PipelineError> {
    let audio = audio::ingest_path(path)?;
    transcribe(&audio, config)
}

/// Ingest raw audio bytes and transcribe them.
pub fn transcribe_bytes(
    data: Vec<u8>,
    extension: Option<&str>,
    config: &TranscribeConfig,
) -> Result<Transcription, PipelineError> {
    let audio = audio::ingest_bytes(data, extension)?;
    transcribe(&audio, config)
}

fn record(trace: Option<&TraceWriter>, entry: TraceEntry) {
    if let Some(writer) = trace {
        if let Err(e) = writer.write(&entry) {
            log::warn!("failed to write trace entry: {e}");
        }
    }
}

/// Analysis heuristics never fail on valid input, so a non-finite value here
/// is an internal fault worth aborting on rather than rendering garbage.
fn validate_events(events: &[NoteEvent]) -> Result<(), PipelineError> {
    for event in events {
        if !event.start.is_finite() || !event.end.is_finite() || !event.frequency.is_finite() {
            log::error!("non-finite value in note event: {event:?}");
            return Err(PipelineError::Internal(format!(
                "non-finite value in note event starting at {}",
                event.start
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fretboard::Position;

    fn tone_into(samples: &mut Vec<f32>, freq: f64, sample_rate: u32, duration_secs: f64) {
        let num_samples = (duration_secs * sample_rate as f64) as usize;
        for i in 0..num_samples {
            let t = i as f64 / sample_rate as f64;
            samples.push(((2.0 * std::f64::consts::PI * freq * t).sin() * 0.6) as f32);
        }
    }

    /// Four half-second open-string tones (E2 A2 D3 G3) with sub-threshold
    /// gaps between them.
    fn open_string_scenario() -> AudioBuffer {
        let sr = 44100;
        let mut samples = Vec::new();
        for freq in [82.4, 110.0, 146.8] {
            tone_into(&mut samples, freq, sr, 0.47);
            samples.extend(std::iter::repeat(0.0).take((0.03 * sr as f64) as usize));
        }
        tone_into(&mut samples, 196.0, sr, 0.5);
        AudioBuffer::from_samples(samples, sr)
    }

    #[test]
    fn test_open_string_scenario_maps_to_open_frets() {
        let audio = open_string_scenario();
        let result = transcribe(&audio, &TranscribeConfig::default()).unwrap();

        assert_eq!(result.notes.len(), 4, "notes: {:?}", result.notes);

        let expected = [(6, "E2"), (5, "A2"), (4, "D3"), (3, "G3")];
        for (note, (string, name)) in result.notes.iter().zip(expected) {
            assert_eq!(note.position, Some(Position { string, fret: 0 }));
            assert_eq!(note.name, name);
            assert!(!note.fallback);
        }

        assert_eq!(result.tempo.bpm, 120);
        assert_eq!(result.tempo.time_signature, (4, 4));
    }

    #[test]
    fn test_note_sequence_invariants_hold() {
        let audio = open_string_scenario();
        let result = transcribe(&audio, &TranscribeConfig::default()).unwrap();

        for pair in result.notes.windows(2) {
            assert!(pair[0].start < pair[1].start);
            assert!(pair[0].end <= pair[1].start);
        }
        for note in &result.notes {
            assert!(note.duration() >= 0.05);
        }
    }

    #[test]
    fn test_silence_produces_empty_document() {
        let audio = AudioBuffer::from_samples(vec![0.0; 44100], 44100);
        let result = transcribe(&audio, &TranscribeConfig::default()).unwrap();

        assert!(result.is_empty());
        assert!(result.document.is_empty());
        assert_eq!(result.tempo.bpm, 120);
        assert_eq!(result.document.pages.len(), 1);
    }

    #[test]
    fn test_transcription_is_deterministic() {
        let audio = open_string_scenario();
        let config = TranscribeConfig::default();

        let first = transcribe(&audio, &config).unwrap();
        let second = transcribe(&audio, &config).unwrap();

        let first_json = serde_json::to_string(&first).unwrap();
        let second_json = serde_json::to_string(&second).unwrap();
        assert_eq!(first_json, second_json);
    }

    #[test]
    fn test_garbage_bytes_surface_as_audio_error() {
        let result = transcribe_bytes(
            b"not an audio file".to_vec(),
            None,
            &TranscribeConfig::default(),
        );
        assert!(matches!(result, Err(PipelineError::Audio(_))));
    }
}
