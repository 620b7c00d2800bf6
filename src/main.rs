use clap::Parser;
use fretscribe::pipeline::{self, TraceWriter};
use fretscribe::TranscribeConfig;
use std::path::PathBuf;

fn main() {
    let result = main_result();
    std::process::exit(match result {
        Ok(()) => 0,
        Err(err) => {
            // use Display instead of Debug for user friendly error messages
            log::error!("{err}");
            1
        }
    });
}

fn main_result() -> Result<(), CliError> {
    // setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("fretscribe=info"))
        .init();

    let args = CliArgs::parse();

    if !args.input.exists() {
        return Err(CliError::Config(format!(
            "input file not found {:?}",
            args.input
        )));
    }

    let mut config = TranscribeConfig::default();
    if let Some(title) = args.title {
        config.title = title;
    }

    let output = args
        .output
        .unwrap_or_else(|| args.input.with_extension("tab.json"));
    let trace = args.trace.map(TraceWriter::new);

    let audio = fretscribe::ingest_path(&args.input)?;
    let transcription = pipeline::transcribe_with_trace(&audio, &config, trace.as_ref())?;

    if transcription.is_empty() {
        log::warn!("no notes detected; the tablature will be empty");
    }

    std::fs::write(&output, transcription.document.to_json()?)?;
    log::info!(
        "wrote {} notes ({} bpm, {} pages) to {output:?}",
        transcription.notes.len(),
        transcription.tempo.bpm,
        transcription.document.pages.len(),
    );

    Ok(())
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CliArgs {
    /// Audio file to transcribe.
    input: PathBuf,

    /// Output path for the tablature document (defaults to the input path
    /// with a .tab.json extension).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Title rendered in the document header.
    #[arg(long)]
    title: Option<String>,

    /// Optional path for a JSONL stage trace.
    #[arg(long)]
    trace: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Audio(#[from] fretscribe::AudioError),

    #[error(transparent)]
    Pipeline(#[from] fretscribe::PipelineError),

    #[error("failed to serialize document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}
