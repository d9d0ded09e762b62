//! Configuration for docbatch.
//!
//! A run is driven by one immutable [`Config`]. It is produced by the
//! [`ConfigResolver`], which folds five partial sources (defaults, user file,
//! project file, environment, command line) with a deep merge and then
//! validates the result. A config that fails validation is never returned.
//!
//! # Examples
//!
//! ```no_run
//! use docbatch::config::{ConfigResolver, PartialConfig};
//!
//! # async fn example() -> docbatch::Result<()> {
//! let config = ConfigResolver::new().load(PartialConfig::default()).await?;
//! println!("Converting {} with {} workers", config.input.path.display(), config.options.concurrent);
//! # Ok(())
//! # }
//! ```

mod partial;
mod resolver;

pub use partial::{
    Merge, PartialCompression, PartialConfig, PartialFeatures, PartialFilters, PartialInput,
    PartialOptions, PartialOutput, PartialSort,
};
pub use resolver::{
    ConfigResolver, ConfigSource, ENV_PREFIX, PROJECT_CONFIG_FILES, write_default_config,
};

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{DocBatchError, Result};
use crate::validation::PathValidator;

/// Allowed range for `options.concurrent`.
pub const CONCURRENCY_RANGE: std::ops::RangeInclusive<i64> = 1..=10;

/// Allowed range for `features.retry`.
pub const RETRY_RANGE: std::ops::RangeInclusive<i64> = 0..=5;

/// Placeholder replaced by the source file stem in `output.renamePattern`.
pub const RENAME_PLACEHOLDER: &str = "{name}";

/// Paper size for rendered documents.
///
/// Deserializes through [`FromStr`], so `"a4"` and `"A4"` are both accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PageFormat {
    /// ISO A3.
    A3,
    /// ISO A4.
    #[default]
    A4,
    /// ISO A5.
    A5,
    /// US Letter.
    Letter,
    /// US Legal.
    Legal,
    /// US Tabloid.
    Tabloid,
}

impl FromStr for PageFormat {
    type Err = DocBatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "a3" => Ok(Self::A3),
            "a4" => Ok(Self::A4),
            "a5" => Ok(Self::A5),
            "letter" => Ok(Self::Letter),
            "legal" => Ok(Self::Legal),
            "tabloid" => Ok(Self::Tabloid),
            _ => Err(DocBatchError::invalid_config(format!(
                "Invalid page format: {s}. Must be one of: A3, A4, A5, Letter, Legal, Tabloid"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for PageFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for PageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::A3 => "A3",
            Self::A4 => "A4",
            Self::A5 => "A5",
            Self::Letter => "Letter",
            Self::Legal => "Legal",
            Self::Tabloid => "Tabloid",
        };
        f.write_str(name)
    }
}

/// Page orientation for rendered documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Taller than wide.
    #[default]
    Portrait,
    /// Wider than tall.
    Landscape,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Portrait => f.write_str("portrait"),
            Self::Landscape => f.write_str("landscape"),
        }
    }
}

/// Key used to order PDFs inside a directory before merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMethod {
    /// File name.
    #[default]
    Name,
    /// Modification time.
    Date,
    /// File size in bytes.
    Size,
}

/// Direction applied after sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// Compression quality for merged PDFs.
///
/// Unknown names deserialize to [`CompressionQuality::Medium`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionQuality {
    /// Fewest objects per stream.
    Low,
    /// Balanced.
    #[default]
    Medium,
    /// Most objects per stream.
    High,
}

impl<'de> Deserialize<'de> for CompressionQuality {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Self::from_name_lossy(&String::deserialize(deserializer)?))
    }
}

impl CompressionQuality {
    /// Parse a quality name, falling back to [`CompressionQuality::Medium`]
    /// for anything unrecognized.
    pub fn from_name_lossy(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            "medium" => Self::Medium,
            other => {
                tracing::warn!(quality = other, "unknown compression quality, using medium");
                Self::Medium
            }
        }
    }

    /// Objects-per-stream hint handed to the PDF writer.
    pub fn objects_per_stream(&self) -> u32 {
        match self {
            Self::High => 50,
            Self::Medium => 20,
            Self::Low => 10,
        }
    }
}

/// Include/exclude regular expressions tested against full path strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    /// A file must match at least one of these (when any are present).
    pub include: Vec<String>,
    /// A file must match none of these.
    pub exclude: Vec<String>,
}

/// Where source documents come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputConfig {
    /// Root directory scanned for sources.
    pub path: PathBuf,
    /// Accepted extensions, each `.`-prefixed.
    pub extensions: Vec<String>,
    /// Optional path filters.
    pub filters: Filters,
}

/// Where results are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    /// Root directory for generated PDFs.
    pub path: PathBuf,
    /// Create the output root during validation when it does not exist.
    pub create_dir_if_not_exist: bool,
    /// Mirror the source directory layout under the output root.
    pub maintain_dir_structure: bool,
    /// Output file name pattern; `{name}` is replaced by the source stem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename_pattern: Option<String>,
}

/// Sort policy for merging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortOptions {
    /// Apply sorting before merging.
    pub enabled: bool,
    /// Sort key.
    pub method: SortMethod,
    /// Sort direction.
    pub direction: SortDirection,
}

/// Compression policy for merged PDFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionOptions {
    /// Compress streams when writing.
    pub enabled: bool,
    /// Quality level.
    pub quality: CompressionQuality,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            quality: CompressionQuality::Medium,
        }
    }
}

/// Processing options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    /// Tasks in flight per chunk, 1 to 10.
    pub concurrent: usize,
    /// Per-task render timeout in milliseconds, enforced by the renderer.
    pub timeout: u64,
    /// Paper size.
    pub format: PageFormat,
    /// Page orientation.
    pub orientation: Orientation,
    /// Renderer theme name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    /// Merge ordering.
    pub sort: SortOptions,
    /// Merge compression.
    pub compression: CompressionOptions,
    /// Replace existing outputs instead of skipping them.
    pub overwrite: bool,
}

/// Optional behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    /// Skip sources whose output is not older than the source.
    pub incremental: bool,
    /// Extra attempts for a failed task, 0 to 5.
    pub retry: u32,
    /// Reuse results of earlier conversions in the same service.
    pub cache: bool,
}

/// Complete, validated configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Source settings.
    pub input: InputConfig,
    /// Destination settings.
    pub output: OutputConfig,
    /// Processing options.
    pub options: Options,
    /// Optional behaviors.
    pub features: Features,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: InputConfig {
                path: PathBuf::from("./docs"),
                extensions: vec![".md".to_string()],
                filters: Filters::default(),
            },
            output: OutputConfig {
                path: PathBuf::from("./output"),
                create_dir_if_not_exist: true,
                maintain_dir_structure: true,
                rename_pattern: None,
            },
            options: Options {
                concurrent: 3,
                timeout: 30_000,
                format: PageFormat::A4,
                orientation: Orientation::Portrait,
                theme: None,
                sort: SortOptions::default(),
                compression: CompressionOptions::default(),
                overwrite: false,
            },
            features: Features {
                incremental: false,
                retry: 0,
                cache: true,
            },
        }
    }
}

impl Config {
    /// Check the rules that do not touch the filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`DocBatchError::InvalidConfig`] if the extension list is
    /// malformed, a filter pattern does not compile, or the rename pattern
    /// lacks the `{name}` placeholder.
    pub fn validate(&self, validator: &PathValidator) -> Result<()> {
        if !validator.validate_extensions(&self.input.extensions) {
            return Err(DocBatchError::invalid_config(format!(
                "input.extensions must be a non-empty list of '.'-prefixed extensions, got {:?}",
                self.input.extensions
            )));
        }

        if !CONCURRENCY_RANGE.contains(&(self.options.concurrent as i64)) {
            return Err(DocBatchError::invalid_config(format!(
                "options.concurrent must be between 1 and 10, got {}",
                self.options.concurrent
            )));
        }

        if !RETRY_RANGE.contains(&(self.features.retry as i64)) {
            return Err(DocBatchError::invalid_config(format!(
                "features.retry must be between 0 and 5, got {}",
                self.features.retry
            )));
        }

        for pattern in self
            .input
            .filters
            .include
            .iter()
            .chain(&self.input.filters.exclude)
        {
            regex::Regex::new(pattern)?;
        }

        if let Some(pattern) = &self.output.rename_pattern
            && !pattern.contains(RENAME_PLACEHOLDER)
        {
            return Err(DocBatchError::invalid_config(format!(
                "output.renamePattern must contain {RENAME_PLACEHOLDER}, got {pattern:?}"
            )));
        }

        Ok(())
    }

    /// Check input and output paths, creating the output root if configured.
    ///
    /// Nothing is created for an output path that fails the format and
    /// safety checks.
    ///
    /// # Errors
    ///
    /// Returns [`DocBatchError::InvalidConfig`] when either path is rejected
    /// by the validator or the output root cannot be created.
    pub async fn check_paths(&self, validator: &PathValidator) -> Result<()> {
        if !validator.validate_input(&self.input.path) {
            return Err(DocBatchError::invalid_config(format!(
                "input.path is not a valid or safe path: {}",
                self.input.path.display()
            )));
        }

        if !validator.validate_input(&self.output.path) {
            return Err(DocBatchError::invalid_config(format!(
                "output.path is not a valid or safe path: {}",
                self.output.path.display()
            )));
        }

        if self.output.create_dir_if_not_exist {
            tokio::fs::create_dir_all(&self.output.path)
                .await
                .map_err(|e| {
                    DocBatchError::invalid_config(format!(
                        "cannot create output directory {}: {e}",
                        self.output.path.display()
                    ))
                })?;
        }

        if !validator.validate_output(&self.output.path).await {
            return Err(DocBatchError::invalid_config(format!(
                "output.path is not a valid or writable path: {}",
                self.output.path.display()
            )));
        }

        Ok(())
    }

    /// Output path for a converted source file.
    ///
    /// The file name comes from `renamePattern` (or the source stem) with a
    /// `.pdf` extension. With `maintainDirStructure` the source's directory
    /// relative to the input root is recreated under the output root.
    pub fn output_path_for(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut file_name = match &self.output.rename_pattern {
            Some(pattern) => pattern.replace(RENAME_PLACEHOLDER, &stem),
            None => stem,
        };
        if !file_name.to_lowercase().ends_with(".pdf") {
            file_name.push_str(".pdf");
        }

        let mut target = self.output.path.clone();
        if self.output.maintain_dir_structure
            && let Some(parent) = source.parent()
            && let Ok(relative) = parent.strip_prefix(&self.input.path)
        {
            target.push(relative);
        }
        target.push(file_name);
        target
    }
}
