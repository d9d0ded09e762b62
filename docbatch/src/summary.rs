//! Tasks, their results, and the run summary derived from them.

use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// What a task does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Render one source file to PDF.
    Convert,
    /// Merge one directory's PDFs.
    Merge,
}

/// A unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Source file, or directory for merges.
    pub source: PathBuf,
    /// Where the output goes.
    pub target: PathBuf,
    /// What to do.
    pub kind: TaskKind,
}

/// Outcome of one task. Produced exactly once per task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    /// Whether the task succeeded.
    pub success: bool,
    /// Source file or directory.
    pub source: PathBuf,
    /// Output path, when one was produced or already existed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall time in milliseconds.
    pub duration_ms: u64,
    /// Succeeded without doing work because the output already existed.
    pub skipped: bool,
}

impl TaskResult {
    /// A successful result.
    pub fn ok(source: impl Into<PathBuf>, output: impl Into<PathBuf>, elapsed: Duration) -> Self {
        Self {
            success: true,
            source: source.into(),
            output: Some(output.into()),
            error: None,
            duration_ms: millis(elapsed),
            skipped: false,
        }
    }

    /// A failed result.
    pub fn failed(source: impl Into<PathBuf>, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: false,
            source: source.into(),
            output: None,
            error: Some(error.into()),
            duration_ms: millis(elapsed),
            skipped: false,
        }
    }

    /// A success that did no work.
    pub fn skipped(source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            skipped: true,
            ..Self::ok(source, output, Duration::ZERO)
        }
    }
}

/// One entry of [`Summary::failed_operations`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedOperation {
    /// Source of the failed task.
    pub path: PathBuf,
    /// Its error message.
    pub error: String,
}

/// Aggregate statistics for a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Number of results.
    pub total: usize,
    /// Successful results, skipped ones included.
    pub success: usize,
    /// Failed results.
    pub failed: usize,
    /// Successful results that were skipped.
    pub skipped: usize,
    /// Elapsed time since the run started.
    pub duration_ms: u64,
    /// `success / total * 100`, or 0 for an empty run.
    pub success_rate: f64,
    /// Failures with their messages, in result order.
    pub failed_operations: Vec<FailedOperation>,
}

impl Summary {
    /// Summarize `results` for a run that began at `started`.
    pub fn from_results(results: &[TaskResult], started: Instant) -> Self {
        let total = results.len();
        let success = results.iter().filter(|r| r.success).count();
        let skipped = results.iter().filter(|r| r.success && r.skipped).count();

        let failed_operations: Vec<FailedOperation> = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| FailedOperation {
                path: r.source.clone(),
                error: r.error.clone().unwrap_or_else(|| "unknown error".to_string()),
            })
            .collect();

        let success_rate = if total == 0 {
            0.0
        } else {
            success as f64 / total as f64 * 100.0
        };

        Self {
            total,
            success,
            failed: failed_operations.len(),
            skipped,
            duration_ms: millis(started.elapsed()),
            success_rate,
            failed_operations,
        }
    }

    /// Whether every task succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
