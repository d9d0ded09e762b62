//! Path and extension validation.
//!
//! These checks run once after configuration resolution. They are soft: each
//! returns `bool` and the config resolver decides whether a `false` is fatal.
//! Existence of the input path is deliberately not checked here; a missing
//! input surfaces later as an I/O error from the scanner.
//!
//! # Examples
//!
//! ```
//! use docbatch::validation::PathValidator;
//!
//! let validator = PathValidator::new();
//! assert!(validator.is_valid_format("./docs/guide"));
//! assert!(!validator.is_valid_format("docs/*.md"));
//! assert!(validator.validate_extensions(&[".md".to_string()]));
//! ```

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Longest path string accepted by [`PathValidator::is_valid_format`].
pub const MAX_PATH_LEN: usize = 1024;

const FORBIDDEN_CHARS: [char; 7] = ['<', '>', ':', '"', '|', '?', '*'];

const SYSTEM_DIRS: [&str; 4] = ["/etc", "/system", "/Windows", "/Program Files"];

static PATH_CHARSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[./]?[\w/.\-]+$").expect("static pattern compiles"));

/// Format and safety checks for filesystem paths.
#[derive(Debug, Clone, Default)]
pub struct PathValidator {
    /// Extra directories treated as unsafe, in addition to the system list.
    denylist: Vec<PathBuf>,
}

impl PathValidator {
    /// Create a validator with the built-in system directory denylist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an extra directory that output and input paths may not live under.
    pub fn deny(mut self, dir: impl Into<PathBuf>) -> Self {
        self.denylist.push(dir.into());
        self
    }

    /// Check that a path string is well-formed.
    ///
    /// Rejects empty strings, strings longer than [`MAX_PATH_LEN`], and any of
    /// `< > : " | ? *`. Accepts letters, digits, `/ - _ .`, optionally
    /// prefixed by `.` or `/`.
    pub fn is_valid_format(&self, path: &str) -> bool {
        if path.is_empty() || path.chars().count() > MAX_PATH_LEN {
            return false;
        }

        if path.contains(FORBIDDEN_CHARS) {
            return false;
        }

        PATH_CHARSET.is_match(path)
    }

    /// Check that an absolute path is not the root and not under a system directory.
    pub fn is_safe(&self, resolved: &Path) -> bool {
        if resolved.parent().is_none() {
            return false;
        }

        let under_system = SYSTEM_DIRS.iter().any(|dir| resolved.starts_with(dir));
        let under_denied = self.denylist.iter().any(|dir| resolved.starts_with(dir));

        !(under_system || under_denied)
    }

    /// Validate an input path (format and safety; existence is not required).
    pub fn validate_input(&self, path: &Path) -> bool {
        let Some(raw) = path.to_str() else {
            tracing::warn!(path = %path.display(), "input path is not valid UTF-8");
            return false;
        };

        if !self.is_valid_format(raw) {
            tracing::warn!(path = raw, "input path has an invalid format");
            return false;
        }

        match std::path::absolute(path) {
            Ok(resolved) if self.is_safe(&resolved) => true,
            Ok(resolved) => {
                tracing::warn!(path = %resolved.display(), "input path points at a protected location");
                false
            }
            Err(err) => {
                tracing::warn!(path = raw, error = %err, "cannot resolve input path");
                false
            }
        }
    }

    /// Validate an output path, creating its parent directory when absent.
    ///
    /// Returns `false` only when the path is malformed or unsafe, or the
    /// parent directory cannot be created.
    pub async fn validate_output(&self, path: &Path) -> bool {
        if !self.validate_input(path) {
            return false;
        }

        let Ok(resolved) = std::path::absolute(path) else {
            return false;
        };

        let Some(parent) = resolved.parent() else {
            return false;
        };

        if tokio::fs::metadata(parent).await.is_ok() {
            return true;
        }

        match tokio::fs::create_dir_all(parent).await {
            Ok(()) => {
                tracing::debug!(dir = %parent.display(), "created output parent directory");
                true
            }
            Err(err) => {
                tracing::warn!(dir = %parent.display(), error = %err, "cannot create output parent directory");
                false
            }
        }
    }

    /// Check a list of file extensions.
    ///
    /// The list must be non-empty and each entry must start with `.` and be
    /// longer than one character.
    pub fn validate_extensions(&self, extensions: &[String]) -> bool {
        !extensions.is_empty()
            && extensions
                .iter()
                .all(|ext| ext.starts_with('.') && ext.len() > 1)
    }
}
