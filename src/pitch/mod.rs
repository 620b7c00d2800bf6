// Pitch tracking module

pub mod tracker;

pub use tracker::{track_pitch, PitchConfig, PitchFrame, PitchTrack};
