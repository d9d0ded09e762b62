//! Rendering collaborator.
//!
//! The pipeline hands every source file to a [`Renderer`]. The shipped
//! [`CommandRenderer`] runs an external program once per file and enforces
//! the configured timeout, killing the child when it expires.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::{Orientation, PageFormat};
use crate::error::{DocBatchError, Result};

/// Kind of source a conversion accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    /// `.md` and `.markdown` files.
    Markdown,
    /// `.html` and `.htm` files.
    Html,
}

impl ConversionKind {
    /// Extensions this kind accepts, `.`-prefixed.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Markdown => &[".md", ".markdown"],
            Self::Html => &[".html", ".htm"],
        }
    }

    /// Whether `path` has one of [`extensions`](Self::extensions),
    /// compared case-insensitively.
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = format!(".{}", ext.to_lowercase());
        self.extensions().contains(&ext.as_str())
    }

    /// Message for a source with the wrong extension.
    pub fn invalid_source_message(&self) -> &'static str {
        match self {
            Self::Markdown => "not a valid Markdown file",
            Self::Html => "not a valid HTML file",
        }
    }
}

/// Everything a renderer needs for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    /// Source document.
    pub source: PathBuf,
    /// PDF to produce.
    pub output: PathBuf,
    /// Source kind.
    pub kind: ConversionKind,
    /// Paper size.
    pub format: PageFormat,
    /// Page orientation.
    pub orientation: Orientation,
    /// Optional theme name.
    pub theme: Option<String>,
    /// Time limit; zero means none.
    pub timeout: Duration,
}

/// Turns one source document into a PDF.
///
/// Called once per task with no state shared between calls.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Produce `request.output` from `request.source`.
    async fn render(&self, request: &RenderRequest) -> Result<()>;
}

/// Default program for [`CommandRenderer`].
pub const DEFAULT_PROGRAM: &str = "pandoc";

/// Renders by running an external program.
///
/// Arguments may contain `{input}`, `{output}`, `{format}`, `{orientation}`
/// and `{theme}`, which are replaced per request. Theme arguments are
/// appended only when the request names a theme.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
    theme_args: Vec<String>,
}

impl Default for CommandRenderer {
    fn default() -> Self {
        Self::new(
            DEFAULT_PROGRAM,
            [
                "{input}",
                "-o",
                "{output}",
                "-V",
                "papersize:{format}",
                "-V",
                "geometry:{orientation}",
            ],
        )
        .with_theme_args(["--css", "{theme}"])
    }
}

impl CommandRenderer {
    /// Renderer running `program` with `args`.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            theme_args: Vec::new(),
        }
    }

    /// Arguments appended when a theme is set.
    pub fn with_theme_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.theme_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Program name.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments with placeholders filled in for `request`.
    pub fn command_args(&self, request: &RenderRequest) -> Vec<String> {
        let input = request.source.to_string_lossy();
        let output = request.output.to_string_lossy();
        let format = request.format.to_string();
        let orientation = request.orientation.to_string();
        let theme = request.theme.as_deref().unwrap_or_default();

        let extra: &[String] = if request.theme.is_some() {
            &self.theme_args
        } else {
            &[]
        };

        self.args
            .iter()
            .chain(extra)
            .map(|arg| {
                arg.replace("{input}", &input)
                    .replace("{output}", &output)
                    .replace("{format}", &format)
                    .replace("{orientation}", &orientation)
                    .replace("{theme}", theme)
            })
            .collect()
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<()> {
        let args = self.command_args(request);
        tracing::debug!(program = %self.program, ?args, "starting renderer");

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DocBatchError::render(&request.source, format!("cannot start {}: {e}", self.program))
            })?;

        let waited = if request.timeout.is_zero() {
            child.wait_with_output().await
        } else {
            match tokio::time::timeout(request.timeout, child.wait_with_output()).await {
                Ok(waited) => waited,
                Err(_) => {
                    return Err(DocBatchError::RenderTimeout {
                        path: request.source.clone(),
                        timeout_ms: u64::try_from(request.timeout.as_millis()).unwrap_or(u64::MAX),
                    });
                }
            }
        };
        let output = waited.map_err(|e| DocBatchError::render(&request.source, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .map(str::trim)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} exited with {}", self.program, output.status));
            return Err(DocBatchError::render(&request.source, reason));
        }

        if !tokio::fs::try_exists(&request.output).await.unwrap_or(false) {
            return Err(DocBatchError::render(
                &request.source,
                format!("{} produced no output", self.program),
            ));
        }

        Ok(())
    }
}
