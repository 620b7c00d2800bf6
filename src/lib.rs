//! Fretscribe - monophonic audio to guitar tablature
//!
//! The pipeline runs in strict sequence: audio ingest, pitch tracking, onset
//! segmentation, fretboard mapping, tempo estimation and tab layout. Each
//! stage consumes only the previous stage's output and holds no shared
//! state, so independent transcriptions can run concurrently.
//!
//! # Example
//!
//! ```no_run
//! use fretscribe::{transcribe_path, TranscribeConfig};
//!
//! let config = TranscribeConfig::default();
//! let result = transcribe_path("recording.wav".as_ref(), &config).unwrap();
//! println!("{} notes at {} bpm", result.notes.len(), result.tempo.bpm);
//! ```

pub mod audio;
pub mod fretboard;
pub mod note;
pub mod pipeline;
pub mod pitch;
pub mod tab;
pub mod tempo;

// Re-export the main types for convenience
pub use audio::{ingest_bytes, ingest_path, AudioBuffer, AudioError};
pub use fretboard::{Fingering, FretboardError, Position, TabNote};
pub use note::NoteEvent;
pub use pipeline::{
    transcribe, transcribe_bytes, transcribe_path, transcribe_with_trace, PipelineError,
    TranscribeConfig, Transcription,
};
pub use pitch::{PitchFrame, PitchTrack};
pub use tab::TabDocument;
pub use tempo::TempoEstimate;
