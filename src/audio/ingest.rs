// Audio ingestion
// Decodes input audio to PCM, downmixes to mono, resamples to 44100 Hz and
// truncates to the duration cap

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::{AudioBuffer as SymphoniaBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use thiserror::Error;

/// All analysis runs at this sample rate; ingest resamples everything to it.
pub const TARGET_SAMPLE_RATE: u32 = 44100;

/// Hard duration cap bounding per-request frame count, memory and CPU cost.
pub const MAX_DURATION_SECS: u32 = 300;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to open audio file: {0}")]
    Open(#[from] std::io::Error),

    #[error("unsupported or corrupt audio container: {0}")]
    Probe(symphonia::core::errors::Error),

    #[error("failed to decode audio: {0}")]
    Decode(symphonia::core::errors::Error),

    #[error("no decodable audio track found")]
    NoAudioTrack,

    #[error("audio track does not declare a sample rate")]
    UnknownSampleRate,

    #[error("resampling to {TARGET_SAMPLE_RATE} Hz failed: {0}")]
    Resample(String),

    #[error("decoded audio is empty")]
    EmptyAudio,
}

/// Mono PCM audio at [`TARGET_SAMPLE_RATE`], capped at [`MAX_DURATION_SECS`].
///
/// Samples are f32 in [-1.0, 1.0]. The buffer is owned by a single pipeline
/// invocation and never shared.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Wrap pre-decoded mono samples, e.g. synthesized test signals.
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        AudioBuffer {
            samples,
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Ingest an audio file from disk.
pub fn ingest_path(path: &Path) -> Result<AudioBuffer, AudioError> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    ingest_stream(mss, hint)
}

/// Ingest raw audio bytes, optionally hinting the container format by file
/// extension (e.g. `"wav"`, `"mp3"`).
pub fn ingest_bytes(data: Vec<u8>, extension: Option<&str>) -> Result<AudioBuffer, AudioError> {
    let cursor: Box<dyn MediaSource> = Box::new(Cursor::new(data));
    let mss = MediaSourceStream::new(cursor, Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    ingest_stream(mss, hint)
}

fn ingest_stream(mss: MediaSourceStream, hint: Hint) -> Result<AudioBuffer, AudioError> {
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(AudioError::Probe)?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(AudioError::NoAudioTrack)?;

    let track_id = track.id;
    let input_rate = track
        .codec_params
        .sample_rate
        .ok_or(AudioError::UnknownSampleRate)?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(AudioError::Decode)?;

    // Decode every packet to mono f32.
    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(AudioError::Decode(e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet).map_err(AudioError::Decode)?;
        downmix_to_mono(&decoded, &mut samples);
    }

    if samples.is_empty() {
        return Err(AudioError::EmptyAudio);
    }

    let mut samples = resample(samples, input_rate)?;

    let max_samples = (MAX_DURATION_SECS * TARGET_SAMPLE_RATE) as usize;
    if samples.len() > max_samples {
        log::info!(
            "truncating {:.2}s of audio to the {MAX_DURATION_SECS}s cap",
            samples.len() as f64 / TARGET_SAMPLE_RATE as f64
        );
        samples.truncate(max_samples);
    }

    if samples.is_empty() {
        return Err(AudioError::EmptyAudio);
    }

    log::info!(
        "ingested {:.2}s of audio at {TARGET_SAMPLE_RATE} Hz",
        samples.len() as f64 / TARGET_SAMPLE_RATE as f64
    );

    Ok(AudioBuffer {
        samples,
        sample_rate: TARGET_SAMPLE_RATE,
    })
}

/// Resample mono samples to [`TARGET_SAMPLE_RATE`].
///
/// Input already at the target rate is passed through untouched.
fn resample(samples: Vec<f32>, input_rate: u32) -> Result<Vec<f32>, AudioError> {
    if input_rate == TARGET_SAMPLE_RATE {
        return Ok(samples);
    }

    log::debug!("resampling from {input_rate} Hz to {TARGET_SAMPLE_RATE} Hz");

    let chunk_size = samples.len();
    let mut resampler = FastFixedIn::<f32>::new(
        TARGET_SAMPLE_RATE as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        chunk_size,
        1,
    )
    .map_err(|e| AudioError::Resample(e.to_string()))?;

    let mut output = resampler
        .process(&[samples], None)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    Ok(output.remove(0))
}

/// Append a decoded packet to `out` as mono f32, averaging channels.
fn downmix_to_mono(decoded: &AudioBufferRef, out: &mut Vec<f32>) {
    fn downmix<S>(buf: &SymphoniaBuffer<S>, out: &mut Vec<f32>)
    where
        S: Sample,
        f32: FromSample<S>,
    {
        let channels = buf.spec().channels.count();
        let frames = buf.frames();
        out.reserve(frames);

        for frame_idx in 0..frames {
            let mut sum = 0.0f32;
            for ch in 0..channels {
                sum += f32::from_sample(buf.chan(ch)[frame_idx]);
            }
            out.push(sum / channels as f32);
        }
    }

    match decoded {
        AudioBufferRef::U8(buf) => downmix(buf.as_ref(), out),
        AudioBufferRef::U16(buf) => downmix(buf.as_ref(), out),
        AudioBufferRef::U24(buf) => downmix(buf.as_ref(), out),
        AudioBufferRef::U32(buf) => downmix(buf.as_ref(), out),
        AudioBufferRef::S8(buf) => downmix(buf.as_ref(), out),
        AudioBufferRef::S16(buf) => downmix(buf.as_ref(), out),
        AudioBufferRef::S24(buf) => downmix(buf.as_ref(), out),
        AudioBufferRef::S32(buf) => downmix(buf.as_ref(), out),
        AudioBufferRef::F32(buf) => downmix(buf.as_ref(), out),
        AudioBufferRef::F64(buf) => downmix(buf.as_ref(), out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use tempfile::TempDir;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn tone_i16(freq: f64, sample_rate: u32, num_samples: usize, amplitude: f64) -> Vec<i16> {
        (0..num_samples)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                ((2.0 * std::f64::consts::PI * freq * t).sin() * amplitude * 32767.0) as i16
            })
            .collect()
    }

    #[test]
    fn test_ingest_mono_wav_passthrough() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        let samples = tone_i16(440.0, 44100, 88200, 0.5);
        write_wav(&path, 44100, 1, &samples);

        let audio = ingest_path(&path).unwrap();

        assert_eq!(audio.sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(audio.len(), 88200);
        assert!((audio.duration_secs() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_ingest_downmixes_stereo() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");

        // Left and right cancel out when averaged.
        let mut interleaved = Vec::with_capacity(2000);
        for _ in 0..1000 {
            interleaved.push(16000i16);
            interleaved.push(-16000i16);
        }
        write_wav(&path, 44100, 2, &interleaved);

        let audio = ingest_path(&path).unwrap();

        assert_eq!(audio.len(), 1000);
        assert!(audio.samples.iter().all(|s| s.abs() < 1e-3));
    }

    #[test]
    fn test_ingest_resamples_to_44100() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("48k.wav");
        let samples = tone_i16(440.0, 48000, 48000, 0.5);
        write_wav(&path, 48000, 1, &samples);

        let audio = ingest_path(&path).unwrap();

        assert_eq!(audio.sample_rate, TARGET_SAMPLE_RATE);
        // One second of input stays roughly one second of output.
        assert!(
            audio.len() >= 44100 - 10 && audio.len() <= 44100 + 10,
            "expected ~44100 samples, got {}",
            audio.len()
        );
    }

    #[test]
    fn test_ingest_truncates_to_duration_cap() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("long.wav");

        // 300.5 seconds of silence at 44100 Hz.
        let num_samples = (300.5 * 44100.0) as usize;
        write_wav(&path, 44100, 1, &vec![0i16; num_samples]);

        let audio = ingest_path(&path).unwrap();

        assert_eq!(audio.len(), 13_230_000);
        assert!((audio.duration_secs() - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_ingest_rejects_garbage_bytes() {
        let result = ingest_bytes(b"definitely not audio".to_vec(), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_ingest_rejects_empty_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav(&path, 44100, 1, &[]);

        let result = ingest_path(&path);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let result = ingest_path(Path::new("/nonexistent/file.mp3"));
        assert!(matches!(result, Err(AudioError::Open(_))));
    }
}
