//! Partial configuration layers and the deep merge between them.
//!
//! Every field is optional. A layer only carries what its source set, and
//! [`Merge::merge`] folds a higher-priority layer over a lower one: nested
//! sections merge field by field, while scalars and lists are replaced
//! whenever the higher layer defines them. Unknown keys are rejected when a
//! layer is deserialized.
//!
//! Field meanings are those of the matching [`Config`] fields.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{
    CONCURRENCY_RANGE, CompressionOptions, CompressionQuality, Config, Features, Filters,
    InputConfig, Options, Orientation, OutputConfig, PageFormat, RETRY_RANGE, SortDirection,
    SortMethod, SortOptions,
};
use crate::error::{DocBatchError, Result};

/// Combine two layers, preferring `higher` wherever it is defined.
pub trait Merge: Sized {
    /// Fold `higher` over `self`.
    fn merge(self, higher: Self) -> Self;
}

fn merge_section<T: Merge>(lower: Option<T>, higher: Option<T>) -> Option<T> {
    match (lower, higher) {
        (Some(lower), Some(higher)) => Some(lower.merge(higher)),
        (lower, higher) => higher.or(lower),
    }
}

fn required<T>(value: Option<T>, key: &str) -> Result<T> {
    value.ok_or_else(|| DocBatchError::invalid_config(format!("missing required setting {key}")))
}

/// Partial `input.filters` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct PartialFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
}

impl Merge for PartialFilters {
    fn merge(self, higher: Self) -> Self {
        Self {
            include: higher.include.or(self.include),
            exclude: higher.exclude.or(self.exclude),
        }
    }
}

/// Partial `input` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct PartialInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<PartialFilters>,
}

impl Merge for PartialInput {
    fn merge(self, higher: Self) -> Self {
        Self {
            path: higher.path.or(self.path),
            extensions: higher.extensions.or(self.extensions),
            filters: merge_section(self.filters, higher.filters),
        }
    }
}

/// Partial `output` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct PartialOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_dir_if_not_exist: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintain_dir_structure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename_pattern: Option<String>,
}

impl Merge for PartialOutput {
    fn merge(self, higher: Self) -> Self {
        Self {
            path: higher.path.or(self.path),
            create_dir_if_not_exist: higher.create_dir_if_not_exist.or(self.create_dir_if_not_exist),
            maintain_dir_structure: higher.maintain_dir_structure.or(self.maintain_dir_structure),
            rename_pattern: higher.rename_pattern.or(self.rename_pattern),
        }
    }
}

/// Partial `options.sort` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct PartialSort {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<SortMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<SortDirection>,
}

impl Merge for PartialSort {
    fn merge(self, higher: Self) -> Self {
        Self {
            enabled: higher.enabled.or(self.enabled),
            method: higher.method.or(self.method),
            direction: higher.direction.or(self.direction),
        }
    }
}

/// Partial `options.compression` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct PartialCompression {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<CompressionQuality>,
}

impl Merge for PartialCompression {
    fn merge(self, higher: Self) -> Self {
        Self {
            enabled: higher.enabled.or(self.enabled),
            quality: higher.quality.or(self.quality),
        }
    }
}

/// Partial `options` section.
///
/// Numeric fields are signed so that out-of-range values reach validation
/// and are reported as such instead of failing to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct PartialOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrent: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<PageFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<PartialSort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<PartialCompression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
}

impl Merge for PartialOptions {
    fn merge(self, higher: Self) -> Self {
        Self {
            concurrent: higher.concurrent.or(self.concurrent),
            timeout: higher.timeout.or(self.timeout),
            format: higher.format.or(self.format),
            orientation: higher.orientation.or(self.orientation),
            theme: higher.theme.or(self.theme),
            sort: merge_section(self.sort, higher.sort),
            compression: merge_section(self.compression, higher.compression),
            overwrite: higher.overwrite.or(self.overwrite),
        }
    }
}

/// Partial `features` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct PartialFeatures {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incremental: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<bool>,
}

impl Merge for PartialFeatures {
    fn merge(self, higher: Self) -> Self {
        Self {
            incremental: higher.incremental.or(self.incremental),
            retry: higher.retry.or(self.retry),
            cache: higher.cache.or(self.cache),
        }
    }
}

/// One configuration layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct PartialConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<PartialInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PartialOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<PartialOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<PartialFeatures>,
}

impl Merge for PartialConfig {
    fn merge(self, higher: Self) -> Self {
        Self {
            input: merge_section(self.input, higher.input),
            output: merge_section(self.output, higher.output),
            options: merge_section(self.options, higher.options),
            features: merge_section(self.features, higher.features),
        }
    }
}

impl PartialConfig {
    /// Whether the layer sets nothing at all.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Turn a fully merged layer into a typed [`Config`].
    ///
    /// # Errors
    ///
    /// Returns [`DocBatchError::InvalidConfig`] when a required setting is
    /// missing or a numeric setting is out of range.
    pub fn into_config(self) -> Result<Config> {
        let input = self.input.unwrap_or_default();
        let filters = input.filters.unwrap_or_default();
        let output = self.output.unwrap_or_default();
        let options = self.options.unwrap_or_default();
        let sort = options.sort.unwrap_or_default();
        let compression = options.compression.unwrap_or_default();
        let features = self.features.unwrap_or_default();

        let concurrent = required(options.concurrent, "options.concurrent")?;
        if !CONCURRENCY_RANGE.contains(&concurrent) {
            return Err(DocBatchError::invalid_config(format!(
                "options.concurrent must be between 1 and 10, got {concurrent}"
            )));
        }

        let timeout = required(options.timeout, "options.timeout")?;
        let timeout = u64::try_from(timeout).map_err(|_| {
            DocBatchError::invalid_config(format!(
                "options.timeout must be zero or positive, got {timeout}"
            ))
        })?;

        let retry = required(features.retry, "features.retry")?;
        if !RETRY_RANGE.contains(&retry) {
            return Err(DocBatchError::invalid_config(format!(
                "features.retry must be between 0 and 5, got {retry}"
            )));
        }

        Ok(Config {
            input: InputConfig {
                path: required(input.path, "input.path")?,
                extensions: required(input.extensions, "input.extensions")?,
                filters: Filters {
                    include: filters.include.unwrap_or_default(),
                    exclude: filters.exclude.unwrap_or_default(),
                },
            },
            output: OutputConfig {
                path: required(output.path, "output.path")?,
                create_dir_if_not_exist: output.create_dir_if_not_exist.unwrap_or(false),
                maintain_dir_structure: output.maintain_dir_structure.unwrap_or(false),
                rename_pattern: output.rename_pattern,
            },
            options: Options {
                concurrent: concurrent as usize,
                timeout,
                format: options.format.unwrap_or_default(),
                orientation: options.orientation.unwrap_or_default(),
                theme: options.theme,
                sort: SortOptions {
                    enabled: sort.enabled.unwrap_or(false),
                    method: sort.method.unwrap_or_default(),
                    direction: sort.direction.unwrap_or_default(),
                },
                compression: CompressionOptions {
                    enabled: compression.enabled.unwrap_or(false),
                    quality: compression.quality.unwrap_or_default(),
                },
                overwrite: options.overwrite.unwrap_or(false),
            },
            features: Features {
                incremental: features.incremental.unwrap_or(false),
                retry: retry as u32,
                cache: features.cache.unwrap_or(false),
            },
        })
    }
}

impl From<&Config> for PartialConfig {
    fn from(config: &Config) -> Self {
        Self {
            input: Some(PartialInput {
                path: Some(config.input.path.clone()),
                extensions: Some(config.input.extensions.clone()),
                filters: Some(PartialFilters {
                    include: Some(config.input.filters.include.clone()),
                    exclude: Some(config.input.filters.exclude.clone()),
                }),
            }),
            output: Some(PartialOutput {
                path: Some(config.output.path.clone()),
                create_dir_if_not_exist: Some(config.output.create_dir_if_not_exist),
                maintain_dir_structure: Some(config.output.maintain_dir_structure),
                rename_pattern: config.output.rename_pattern.clone(),
            }),
            options: Some(PartialOptions {
                concurrent: Some(config.options.concurrent as i64),
                timeout: Some(config.options.timeout as i64),
                format: Some(config.options.format),
                orientation: Some(config.options.orientation),
                theme: config.options.theme.clone(),
                sort: Some(PartialSort {
                    enabled: Some(config.options.sort.enabled),
                    method: Some(config.options.sort.method),
                    direction: Some(config.options.sort.direction),
                }),
                compression: Some(PartialCompression {
                    enabled: Some(config.options.compression.enabled),
                    quality: Some(config.options.compression.quality),
                }),
                overwrite: Some(config.options.overwrite),
            }),
            features: Some(PartialFeatures {
                incremental: Some(config.features.incremental),
                retry: Some(config.features.retry as i64),
                cache: Some(config.features.cache),
            }),
        }
    }
}
