// Audio processing module
// Handles decoding/resampling of input audio and shared spectral analysis

pub mod ingest;
pub mod stft;

pub use ingest::{
    ingest_bytes, ingest_path, AudioBuffer, AudioError, MAX_DURATION_SECS, TARGET_SAMPLE_RATE,
};
pub use stft::{apply_hann_window, Stft};
