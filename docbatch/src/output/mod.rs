//! User-facing console output.
//!
//! Logging goes through `tracing`; this module prints the lines a user of
//! the command line reads: per-task progress, the run summary, and the list
//! of failed operations.
//!
//! # Examples
//!
//! ```no_run
//! use docbatch::output::{OutputFormatter, display_summary};
//! use docbatch::summary::Summary;
//! use std::time::Instant;
//!
//! let formatter = OutputFormatter::new(false, false);
//! display_summary(&formatter, &Summary::from_results(&[], Instant::now()));
//! ```

pub mod formatter;

pub use formatter::{MessageLevel, OutputFormatter};

use std::path::Path;

use crate::context::{RunEvent, SkipReason};
use crate::io::format_file_size;
use crate::summary::Summary;

/// Print one progress event.
pub fn display_event(formatter: &OutputFormatter, event: &RunEvent) {
    match event {
        RunEvent::TaskStarted { source } => {
            formatter.debug(&format!("Processing {}", source.display()));
        }
        RunEvent::TaskFinished {
            source,
            success: true,
            duration_ms,
        } => {
            formatter.success(&format!("{} ({duration_ms} ms)", source.display()));
        }
        RunEvent::TaskFinished {
            source,
            success: false,
            ..
        } => {
            formatter.warning(&format!("Failed: {}", source.display()));
        }
        RunEvent::TaskSkipped { source, reason } => {
            let why = match reason {
                SkipReason::OutputExists => "output exists",
                SkipReason::UpToDate => "up to date",
            };
            formatter.debug(&format!("Skipped {} ({why})", source.display()));
        }
        RunEvent::DirectoryMerged {
            dir,
            output,
            files,
            bytes,
        } => {
            formatter.success(&merged_line(dir, output, *files, *bytes));
        }
        RunEvent::DirectorySkipped { dir, output } => {
            formatter.info(&format!(
                "Skipped {} ({} exists)",
                dir.display(),
                output.display()
            ));
        }
    }
}

fn merged_line(dir: &Path, output: &Path, files: usize, bytes: u64) -> String {
    format!(
        "{} -> {} ({files} files, {})",
        dir.display(),
        output.display(),
        format_file_size(bytes)
    )
}

/// Print the run summary and any failed operations.
pub fn display_summary(formatter: &OutputFormatter, summary: &Summary) {
    formatter.section("Summary");
    formatter.info(&summary_line(summary));
    formatter.detail("Skipped", &summary.skipped.to_string());
    formatter.detail("Duration", &format!("{:.2}s", summary.duration_ms as f64 / 1000.0));

    if summary.failed_operations.is_empty() {
        if summary.total > 0 {
            formatter.success("All operations succeeded");
        }
        return;
    }

    formatter.warning(&format!("{} operation(s) failed:", summary.failed));
    for failed in &summary.failed_operations {
        formatter.error(&format!("{}: {}", failed.path.display(), failed.error));
    }
}

/// One-line description of a summary.
pub fn summary_line(summary: &Summary) -> String {
    format!(
        "Total: {}, succeeded: {}, failed: {}, success rate: {:.1}%",
        summary.total, summary.success, summary.failed, summary.success_rate
    )
}
