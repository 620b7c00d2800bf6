// Pipeline stage tracing
// Optional append-only JSONL log of stage completions, giving the
// surrounding service something to monitor during long transcriptions

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A completed pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// RFC 3339 timestamp of stage completion
    pub timestamp: String,

    /// Stage name, e.g. "pitch_tracking" or "segmentation"
    pub stage: String,

    /// Human-readable summary of what the stage did
    pub message: String,

    /// Number of items the stage produced, when countable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl TraceEntry {
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            stage: stage.into(),
            message: message.into(),
            count: None,
        }
    }

    pub fn with_count(
        stage: impl Into<String>,
        message: impl Into<String>,
        count: usize,
    ) -> Self {
        TraceEntry {
            count: Some(count),
            ..TraceEntry::new(stage, message)
        }
    }
}

/// Append-only JSONL trace writer.
///
/// The file is created on first write; each entry is one JSON line.
pub struct TraceWriter {
    path: PathBuf,
}

impl TraceWriter {
    pub fn new(path: PathBuf) -> Self {
        TraceWriter { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{json}")?;
        file.flush()?;

        Ok(())
    }
}

/// Read all trace entries from a JSONL file.
pub fn read_trace(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(TraceError::Serialization))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trace.jsonl");
        let writer = TraceWriter::new(path.clone());

        writer
            .write(&TraceEntry::with_count("segmentation", "segmented notes", 4))
            .unwrap();
        writer
            .write(&TraceEntry::new("layout", "document laid out"))
            .unwrap();

        let entries = read_trace(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].stage, "segmentation");
        assert_eq!(entries[0].count, Some(4));
        assert_eq!(entries[1].stage, "layout");
        assert_eq!(entries[1].count, None);
    }

    #[test]
    fn test_count_is_omitted_when_absent() {
        let entry = TraceEntry::new("layout", "done");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("count"));
    }
}
