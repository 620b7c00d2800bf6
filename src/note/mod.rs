// Note segmentation module
// Onset detection and aggregation of pitch frames into note events

pub mod segment;
pub mod types;

pub use segment::{segment_notes, OnsetConfig};
pub use types::NoteEvent;
