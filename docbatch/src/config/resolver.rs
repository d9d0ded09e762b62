//! Five-source configuration resolution.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use super::partial::{Merge, PartialConfig, PartialInput, PartialOptions, PartialOutput};
use super::{Config, PageFormat};
use crate::error::{DocBatchError, Result};
use crate::validation::PathValidator;

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "DOCBATCH";

/// Project config file names, in search order. The first one that exists wins.
pub const PROJECT_CONFIG_FILES: [&str; 5] = [
    "docbatch.config.json",
    "docbatch.config.yaml",
    "docbatch.config.yml",
    "docbatch.config.toml",
    "config.json",
];

const USER_CONFIG_DIR: &str = ".docbatch";
const USER_CONFIG_FILE: &str = "config.json";

/// Environment values equal to this string are treated as unset.
const UNDEFINED: &str = "undefined";

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Where a configuration layer came from, lowest priority first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Built-in defaults.
    Defaults,
    /// The per-user file.
    UserFile(PathBuf),
    /// The project-local or explicit `--config` file.
    ProjectFile(PathBuf),
    /// `DOCBATCH_*` environment variables.
    Environment,
    /// Command-line flags.
    CommandLine,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defaults => f.write_str("defaults"),
            Self::UserFile(path) => write!(f, "user file {}", path.display()),
            Self::ProjectFile(path) => write!(f, "project file {}", path.display()),
            Self::Environment => f.write_str("environment"),
            Self::CommandLine => f.write_str("command line"),
        }
    }
}

/// Loads and validates a [`Config`] from defaults, files, environment, and
/// command-line overrides.
pub struct ConfigResolver {
    project_dir: PathBuf,
    user_config: Option<PathBuf>,
    explicit_file: Option<PathBuf>,
    env: EnvLookup,
    validator: PathValidator,
}

impl fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("project_dir", &self.project_dir)
            .field("user_config", &self.user_config)
            .field("explicit_file", &self.explicit_file)
            .finish_non_exhaustive()
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver {
    /// Resolver for the current directory, the real home directory, and the
    /// process environment.
    pub fn new() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            user_config: default_user_config(),
            explicit_file: None,
            env: Arc::new(|key| std::env::var(key).ok()),
            validator: PathValidator::new(),
        }
    }

    /// Directory searched for [`PROJECT_CONFIG_FILES`].
    pub fn project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = dir.into();
        self
    }

    /// Per-user config file, or `None` to skip that layer.
    pub fn user_config(mut self, path: Option<PathBuf>) -> Self {
        self.user_config = path;
        self
    }

    /// Use one explicit file instead of searching the project directory.
    pub fn explicit_file(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_file = path;
        self
    }

    /// Replace the environment lookup.
    pub fn env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    /// Replace the path validator.
    pub fn validator(mut self, validator: PathValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Resolve, merge, and validate.
    ///
    /// # Errors
    ///
    /// Any failure here is a configuration error: an unreadable or malformed
    /// file, an unknown key, an invalid `DOCBATCH_FORMAT`, a value out of
    /// range, or a path rejected by the validator.
    pub async fn load(&self, overrides: PartialConfig) -> Result<Config> {
        let merged = self
            .layers(overrides)
            .await?
            .into_iter()
            .fold(PartialConfig::default(), |acc, (source, layer)| {
                tracing::debug!(%source, "applying configuration layer");
                acc.merge(layer)
            });

        let config = merged.into_config()?;
        config.validate(&self.validator)?;
        config.check_paths(&self.validator).await?;

        tracing::debug!(
            input = %config.input.path.display(),
            output = %config.output.path.display(),
            concurrent = config.options.concurrent,
            "configuration resolved"
        );
        Ok(config)
    }

    /// Every layer that contributes to the result, lowest priority first.
    ///
    /// # Errors
    ///
    /// Fails when a file cannot be parsed, the explicit file is missing, or
    /// an environment value is invalid.
    pub async fn layers(
        &self,
        overrides: PartialConfig,
    ) -> Result<Vec<(ConfigSource, PartialConfig)>> {
        let mut layers = vec![(
            ConfigSource::Defaults,
            PartialConfig::from(&Config::default()),
        )];

        if let Some(path) = &self.user_config
            && tokio::fs::try_exists(path).await.unwrap_or(false)
        {
            layers.push((ConfigSource::UserFile(path.clone()), load_file(path).await?));
        }

        if let Some(path) = self.project_file().await? {
            let layer = load_file(&path).await?;
            layers.push((ConfigSource::ProjectFile(path), layer));
        }

        let env = self.env_layer()?;
        if !env.is_empty() {
            layers.push((ConfigSource::Environment, env));
        }

        if !overrides.is_empty() {
            layers.push((ConfigSource::CommandLine, overrides));
        }

        Ok(layers)
    }

    async fn project_file(&self) -> Result<Option<PathBuf>> {
        if let Some(path) = &self.explicit_file {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Err(DocBatchError::config_parse(path, "file does not exist"));
            }
            return Ok(Some(path.clone()));
        }

        for name in PROJECT_CONFIG_FILES {
            let candidate = self.project_dir.join(name);
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    fn env_var(&self, name: &str) -> Option<String> {
        (self.env)(&format!("{ENV_PREFIX}_{name}")).filter(|value| value != UNDEFINED)
    }

    fn env_number(&self, name: &str) -> Option<i64> {
        let raw = self.env_var(name)?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::debug!(var = name, value = %raw, "ignoring non-numeric environment value");
                None
            }
        }
    }

    fn env_layer(&self) -> Result<PartialConfig> {
        let input_path = self.env_var("INPUT_PATH");
        let output_path = self.env_var("OUTPUT_PATH");
        let concurrent = self.env_number("CONCURRENT");
        let timeout = self.env_number("TIMEOUT");
        let format = self
            .env_var("FORMAT")
            .map(|raw| PageFormat::from_str(&raw))
            .transpose()?;

        let mut layer = PartialConfig::default();
        if input_path.is_some() {
            layer.input = Some(PartialInput {
                path: input_path.map(PathBuf::from),
                ..Default::default()
            });
        }
        if output_path.is_some() {
            layer.output = Some(PartialOutput {
                path: output_path.map(PathBuf::from),
                ..Default::default()
            });
        }
        if concurrent.is_some() || timeout.is_some() || format.is_some() {
            layer.options = Some(PartialOptions {
                concurrent,
                timeout,
                format,
                ..Default::default()
            });
        }
        Ok(layer)
    }
}

fn default_user_config() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(USER_CONFIG_DIR).join(USER_CONFIG_FILE))
}

async fn load_file(path: &Path) -> Result<PartialConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DocBatchError::config_parse(path, e.to_string()))?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let layer = match extension.as_str() {
        "json" => serde_json::from_str(&content).map_err(|e| e.to_string()),
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
        "toml" => toml::from_str(&content).map_err(|e| e.to_string()),
        other => Err(format!("unsupported config format: {other:?}")),
    }
    .map_err(|reason| DocBatchError::config_parse(path, reason))?;

    tracing::debug!(path = %path.display(), "loaded configuration file");
    Ok(layer)
}

/// Write the default configuration as `docbatch.config.json` into `dir`.
///
/// # Errors
///
/// Refuses to replace an existing file unless `force` is set. Returns
/// [`DocBatchError::FailedToWrite`] if the file cannot be written.
pub async fn write_default_config(dir: &Path, force: bool) -> Result<PathBuf> {
    let path = dir.join(PROJECT_CONFIG_FILES[0]);

    if !force && tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(DocBatchError::invalid_config(format!(
            "{} already exists (use --force to replace it)",
            path.display()
        )));
    }

    let mut body = serde_json::to_string_pretty(&Config::default())
        .map_err(|e| DocBatchError::other(e.to_string()))?;
    body.push('\n');

    tokio::fs::write(&path, body)
        .await
        .map_err(|source| DocBatchError::FailedToWrite {
            path: path.clone(),
            source,
        })?;

    tracing::info!(path = %path.display(), "wrote default configuration");
    Ok(path)
}
