//! Error types for docbatch.
//!
//! Errors fall into four families:
//!
//! - **Configuration errors**: schema, range, or path validation failures
//!   during resolution. These are fatal and abort a run before any task starts.
//! - **Scan errors**: an unreadable subdirectory. Recovered locally by the
//!   scanner, which logs them and treats the subtree as empty.
//! - **Task errors**: a single conversion or merge failed. Recovered at the
//!   task boundary and turned into data on the task's result.
//! - **I/O errors**: generic filesystem failures.

use std::io;
use std::path::PathBuf;

/// Result type alias for docbatch operations.
pub type Result<T> = std::result::Result<T, DocBatchError>;

/// Main error type for docbatch operations.
#[derive(Debug, thiserror::Error)]
pub enum DocBatchError {
    /// The resolved configuration violates the schema or a validation rule.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of what is wrong with the configuration.
        message: String,
    },

    /// A configuration file could not be read or parsed.
    #[error("Failed to load configuration file: {}\n  Reason: {reason}", path.display())]
    ConfigParse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Parser or I/O message.
        reason: String,
    },

    /// A directory could not be read while scanning.
    #[error("Cannot read directory: {}\n  Reason: {source}", path.display())]
    Scan {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A source file failed pre-render validation.
    #[error("{reason}: {}", path.display())]
    InvalidSource {
        /// Offending source file.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// The rendering collaborator failed for a source file.
    #[error("Failed to render {}\n  Reason: {reason}", path.display())]
    Render {
        /// Source file being rendered.
        path: PathBuf,
        /// Human-readable message from the renderer.
        reason: String,
    },

    /// The rendering collaborator did not finish within the configured timeout.
    #[error("Rendering {} timed out after {timeout_ms} ms", path.display())]
    RenderTimeout {
        /// Source file being rendered.
        path: PathBuf,
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// Merging PDFs failed.
    #[error("Merge operation failed: {reason}")]
    MergeFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// Failed to load a PDF document.
    #[error("Failed to load PDF: {}\n  Reason: {reason}", path.display())]
    FailedToLoadPdf {
        /// Path to the PDF file.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// A required file does not exist.
    #[error("File not found: {}", path.display())]
    FileNotFound {
        /// Missing path.
        path: PathBuf,
    },

    /// Failed to create an output file or directory.
    #[error("Failed to create output: {}\n  Reason: {source}", path.display())]
    FailedToCreateOutput {
        /// Path where output should be created.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Failed to write an output file.
    #[error("Failed to write to output file: {}\n  Reason: {source}", path.display())]
    FailedToWrite {
        /// Path being written to.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The run was interrupted.
    #[error("Operation cancelled by user")]
    Cancelled,

    /// Generic I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// Generic error with a custom message.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl From<lopdf::Error> for DocBatchError {
    fn from(err: lopdf::Error) -> Self {
        Self::merge_failed(err.to_string())
    }
}

impl From<regex::Error> for DocBatchError {
    fn from(err: regex::Error) -> Self {
        Self::invalid_config(format!("invalid filter pattern: {err}"))
    }
}

impl DocBatchError {
    /// Create an InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a ConfigParse error.
    pub fn config_parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ConfigParse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidSource error.
    pub fn invalid_source(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidSource {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a Render error.
    pub fn render(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Render {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a MergeFailed error.
    pub fn merge_failed(reason: impl Into<String>) -> Self {
        Self::MergeFailed {
            reason: reason.into(),
        }
    }

    /// Create a FailedToLoadPdf error.
    pub fn failed_to_load_pdf(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FailedToLoadPdf {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an Other error with a custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Whether this error belongs to configuration resolution.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. } | Self::ConfigParse { .. })
    }

    /// Whether this error must stop the whole run.
    ///
    /// Everything that happens inside a single task is recoverable; only
    /// configuration problems and cancellation are fatal.
    pub fn is_fatal(&self) -> bool {
        self.is_config_error() || matches!(self, Self::Cancelled)
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfig { .. } => 1,
            Self::ConfigParse { .. } => 1,
            Self::FileNotFound { .. } => 2,
            Self::Scan { .. } => 2,
            Self::InvalidSource { .. } => 3,
            Self::FailedToLoadPdf { .. } => 3,
            Self::Render { .. } => 6,
            Self::RenderTimeout { .. } => 6,
            Self::MergeFailed { .. } => 6,
            Self::FailedToCreateOutput { .. } => 5,
            Self::FailedToWrite { .. } => 5,
            Self::Io { .. } => 5,
            Self::Cancelled => 130, // Standard exit code for SIGINT
            Self::Other { .. } => 1,
        }
    }
}
