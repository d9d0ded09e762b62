//! Per-run context: a run identifier and an optional event sink.
//!
//! Components receive a [`RunContext`] at construction and report progress
//! through it. Nothing is global, so two runs in one process (or two tests)
//! never observe each other's events.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Why a task was left out of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The output exists and overwrite is off.
    OutputExists,
    /// The output is not older than its source.
    UpToDate,
}

/// Progress notifications emitted during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// A task was handed to its collaborator.
    TaskStarted {
        /// Source file.
        source: PathBuf,
    },
    /// A task produced its result.
    TaskFinished {
        /// Source file.
        source: PathBuf,
        /// Whether the final attempt succeeded.
        success: bool,
        /// Wall time across all attempts.
        duration_ms: u64,
    },
    /// A task was excluded before scheduling.
    TaskSkipped {
        /// Source file.
        source: PathBuf,
        /// Why it was excluded.
        reason: SkipReason,
    },
    /// A directory's PDFs were merged.
    DirectoryMerged {
        /// Directory whose files were merged.
        dir: PathBuf,
        /// Merged PDF.
        output: PathBuf,
        /// Number of input files.
        files: usize,
        /// Size of the merged PDF in bytes.
        bytes: u64,
    },
    /// A directory already had its merged output.
    DirectorySkipped {
        /// Directory that was skipped.
        dir: PathBuf,
        /// Existing output.
        output: PathBuf,
    },
}

/// Explicit logger and event-sink handle for one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: String,
    events: Option<UnboundedSender<RunEvent>>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    /// Context with a fresh run id and no event sink.
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        Self {
            run_id: format!("{:x}-{:x}", nanos, std::process::id()),
            events: None,
        }
    }

    /// Context with a fresh run id plus the receiving end of its event sink.
    pub fn with_events() -> (Self, UnboundedReceiver<RunEvent>) {
        let (tx, rx) = unbounded_channel();
        let mut context = Self::new();
        context.events = Some(tx);
        (context, rx)
    }

    /// Identifier of this run.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Span carrying the run id; enter it around a run's work.
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!("run", run_id = %self.run_id)
    }

    /// Send an event. Dropped silently when nobody listens.
    pub fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}
