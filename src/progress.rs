//! Ingest progress reporting.
//!
//! Reports what the pipeline is doing during `repo-chat ingest` so users see
//! how far embedding has got on a large tree. Progress is emitted on
//! **stderr** so stdout stays reserved for the estimate and the answers.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug, PartialEq)]
pub enum IngestProgressEvent {
    /// Walking the source tree. Total unknown.
    Collecting { root: String },
    /// Splitting `files` source files into chunks.
    Chunking { files: u64 },
    /// Counting tokens over `chunks` chunks.
    Estimating { chunks: u64 },
    /// `n` of `total` chunks embedded and stored.
    Embedding { n: u64, total: u64 },
}

/// Receives progress events from the pipeline.
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "ingest  embedding  1,234 / 5,000 chunks".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Collecting { root } => {
                format!("ingest  collecting {}...\n", root)
            }
            IngestProgressEvent::Chunking { files } => {
                format!("ingest  chunking  {} files\n", format_number(*files))
            }
            IngestProgressEvent::Estimating { chunks } => {
                format!("ingest  estimating  {} chunks\n", format_number(*chunks))
            }
            IngestProgressEvent::Embedding { n, total } => format!(
                "ingest  embedding  {} / {} chunks\n",
                format_number(*n),
                format_number(*total)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let obj = match &event {
            IngestProgressEvent::Collecting { root } => serde_json::json!({
                "event": "progress",
                "phase": "collecting",
                "root": root
            }),
            IngestProgressEvent::Chunking { files } => serde_json::json!({
                "event": "progress",
                "phase": "chunking",
                "files": files
            }),
            IngestProgressEvent::Estimating { chunks } => serde_json::json!({
                "event": "progress",
                "phase": "estimating",
                "chunks": chunks
            }),
            IngestProgressEvent::Embedding { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "embedding",
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
