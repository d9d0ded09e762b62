//! Status line formatting.
//!
//! # Examples
//!
//! ```
//! use docbatch::output::OutputFormatter;
//!
//! let formatter = OutputFormatter::new(false, false);
//! formatter.info("Scanning ./docs");
//! formatter.success("Converted 12 files");
//! formatter.error("Renderer not found");
//! ```

use std::io::{self, IsTerminal};

/// Kind of status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    /// Plain informational line.
    Info,
    /// Something finished.
    Success,
    /// Something was skipped or partly failed.
    Warning,
    /// Something failed.
    Error,
    /// Verbose-only detail.
    Debug,
}

impl MessageLevel {
    fn prefix(self) -> &'static str {
        match self {
            Self::Info => "",
            Self::Success => "✓ ",
            Self::Warning => "⚠ ",
            Self::Error => "✗ ",
            Self::Debug => "→ ",
        }
    }

    fn color(self) -> Option<&'static str> {
        match self {
            Self::Info => None,
            Self::Success => Some("\x1b[32m"),
            Self::Warning => Some("\x1b[33m"),
            Self::Error => Some("\x1b[31m"),
            Self::Debug => Some("\x1b[36m"),
        }
    }
}

/// Prints status lines, honoring quiet and verbose modes.
///
/// Warnings and errors go to stderr and are printed even when quiet.
#[derive(Debug, Clone)]
pub struct OutputFormatter {
    quiet: bool,
    verbose: bool,
    colored: bool,
}

impl OutputFormatter {
    /// Formatter for the given modes. Colors are enabled when stdout is a
    /// terminal and `TERM` is set.
    pub fn new(quiet: bool, verbose: bool) -> Self {
        Self {
            quiet,
            verbose: verbose && !quiet,
            colored: io::stdout().is_terminal() && std::env::var_os("TERM").is_some(),
        }
    }

    /// Only warnings and errors.
    pub fn quiet() -> Self {
        Self::new(true, false)
    }

    /// Everything, including details.
    pub fn verbose() -> Self {
        Self::new(false, true)
    }

    /// Same formatter with colors forced on or off.
    pub fn with_color(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    /// Informational line.
    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("{}", self.render(MessageLevel::Info, message));
        }
    }

    /// Success line.
    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{}", self.render(MessageLevel::Success, message));
        }
    }

    /// Warning line.
    pub fn warning(&self, message: &str) {
        eprintln!("{}", self.render(MessageLevel::Warning, message));
    }

    /// Error line.
    pub fn error(&self, message: &str) {
        eprintln!("{}", self.render(MessageLevel::Error, message));
    }

    /// Verbose-only line.
    pub fn debug(&self, message: &str) {
        if self.verbose {
            println!("{}", self.render(MessageLevel::Debug, message));
        }
    }

    /// Blank line followed by a title.
    pub fn section(&self, title: &str) {
        if !self.quiet {
            println!("\n{title}");
        }
    }

    /// Indented `label: value` pair, verbose only.
    pub fn detail(&self, label: &str, value: &str) {
        if self.verbose {
            println!("  {label}: {value}");
        }
    }

    /// Numbered list entry.
    pub fn list_item(&self, index: usize, message: &str) {
        if !self.quiet {
            println!("  {index}. {message}");
        }
    }

    /// Whether quiet mode is on.
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Whether verbose mode is on.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// The line printed for `message` at `level`.
    pub fn render(&self, level: MessageLevel, message: &str) -> String {
        match level.color() {
            Some(color) if self.colored => format!("{color}{}{message}\x1b[0m", level.prefix()),
            _ => format!("{}{message}", level.prefix()),
        }
    }
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new(false, false)
    }
}
