//! Batch conversion of source documents to PDF.
//!
//! [`ConvertService`] owns the current configuration, a [`Renderer`], and a
//! [`ResultCache`]. A run scans the input root, computes one output path per
//! source, drops tasks whose outputs are already in place, and hands the
//! rest to the [`BatchScheduler`].
//!
//! # Examples
//!
//! ```no_run
//! use docbatch::config::{Config, PartialConfig};
//! use docbatch::context::RunContext;
//! use docbatch::convert::{CommandRenderer, ConversionKind, ConvertService};
//! use std::sync::Arc;
//!
//! # async fn example() -> docbatch::Result<()> {
//! let service = ConvertService::new(
//!     Config::default(),
//!     RunContext::new(),
//!     Arc::new(CommandRenderer::default()),
//! );
//! let summary = service.convert_all(ConversionKind::Markdown).await?;
//! println!("{:.1}% converted", summary.success_rate);
//! # Ok(())
//! # }
//! ```

mod cache;
mod renderer;

pub use cache::{CacheKey, DEFAULT_CAPACITY, ResultCache};
pub use renderer::{
    CommandRenderer, ConversionKind, DEFAULT_PROGRAM, RenderRequest, Renderer,
};

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::Instrument;

use crate::batch::BatchScheduler;
use crate::config::{Config, Merge, PartialConfig};
use crate::context::RunContext;
use crate::error::{DocBatchError, Result};
use crate::scan::FileTreeScanner;
use crate::summary::{Summary, Task, TaskKind};
use crate::validation::PathValidator;

/// Converts every matching file under the configured input root.
pub struct ConvertService {
    config: RwLock<Arc<Config>>,
    context: RunContext,
    renderer: Arc<dyn Renderer>,
    cache: Mutex<ResultCache>,
    validator: PathValidator,
}

impl std::fmt::Debug for ConvertService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvertService")
            .field("config", &self.config)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl ConvertService {
    /// Service for an already validated `config`.
    pub fn new(config: Config, context: RunContext, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
            context,
            renderer,
            cache: Mutex::new(ResultCache::default()),
            validator: PathValidator::new(),
        }
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Merge `overrides` over the current configuration and swap it in.
    ///
    /// Runs already in progress keep the snapshot they started with.
    ///
    /// # Errors
    ///
    /// Returns a configuration error and keeps the current configuration
    /// when the merged result does not validate.
    pub async fn update_config(&self, overrides: PartialConfig) -> Result<()> {
        let current = self.config();
        let updated = PartialConfig::from(current.as_ref())
            .merge(overrides)
            .into_config()?;
        updated.validate(&self.validator)?;
        updated.check_paths(&self.validator).await?;

        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(updated);
        tracing::debug!("configuration updated");
        Ok(())
    }

    /// Convert every source of `kind` under the input root.
    ///
    /// # Errors
    ///
    /// Only scanning the input root itself can fail the run. Per-file
    /// failures are reported in the summary.
    pub async fn convert_all(&self, kind: ConversionKind) -> Result<Summary> {
        let config = self.config();

        async {
            let started = Instant::now();

            let scanner = match kind {
                ConversionKind::Markdown => FileTreeScanner::from_config(&config)?,
                ConversionKind::Html => {
                    let extensions: Vec<String> =
                        kind.extensions().iter().map(|e| e.to_string()).collect();
                    let mut html = config.as_ref().clone();
                    html.input.extensions = extensions;
                    FileTreeScanner::from_config(&html)?
                }
            };

            let files = scanner.scan_files(&config.input.path).await?;
            let tasks: Vec<Task> = files
                .into_iter()
                .map(|source| Task {
                    target: config.output_path_for(&source),
                    source,
                    kind: TaskKind::Convert,
                })
                .collect();

            let scheduler = BatchScheduler::from_config(&config, self.context.clone());
            let found = tasks.len();
            let plan = scheduler.plan(tasks).await;
            tracing::info!(
                found,
                scheduled = plan.run.len(),
                skipped = plan.skipped.len(),
                concurrency = scheduler.concurrency(),
                "converting"
            );

            let results = scheduler
                .run_batch(&plan.run, |task| {
                    let source = task.source.clone();
                    let target = task.target.clone();
                    let config = &config;
                    async move { self.convert_file(config, kind, &source, &target).await }
                })
                .await;

            Ok::<_, DocBatchError>(Summary::from_results(&results, started))
        }
        .instrument(self.context.span())
        .await
    }

    /// Convert one source to `target` with `config`.
    ///
    /// # Errors
    ///
    /// [`DocBatchError::InvalidSource`] for a wrong extension or empty
    /// content, otherwise whatever the renderer reports.
    pub async fn convert_file(
        &self,
        config: &Config,
        kind: ConversionKind,
        source: &Path,
        target: &Path,
    ) -> Result<PathBuf> {
        if !kind.accepts(source) {
            return Err(DocBatchError::invalid_source(source, kind.invalid_source_message()));
        }

        let content = tokio::fs::read_to_string(source)
            .await
            .map_err(|e| DocBatchError::invalid_source(source, format!("cannot read file: {e}")))?;
        if content.trim().is_empty() {
            return Err(DocBatchError::invalid_source(source, "file is empty"));
        }

        let key = if config.features.cache {
            CacheKey::for_source(source).await
        } else {
            None
        };

        if let Some(key) = &key {
            let cached = self.cache().get(key).map(Path::to_path_buf);
            if let Some(output) = cached
                && tokio::fs::try_exists(&output).await.unwrap_or(false)
            {
                tracing::debug!(source = %source.display(), "cache hit");
                return Ok(output);
            }
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DocBatchError::FailedToCreateOutput {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let request = RenderRequest {
            source: source.to_path_buf(),
            output: target.to_path_buf(),
            kind,
            format: config.options.format,
            orientation: config.options.orientation,
            theme: config.options.theme.clone(),
            timeout: Duration::from_millis(config.options.timeout),
        };
        self.renderer.render(&request).await?;

        if let Some(key) = key {
            self.cache().insert(key, target.to_path_buf());
        }

        tracing::debug!(source = %source.display(), output = %target.display(), "converted");
        Ok(target.to_path_buf())
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, ResultCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
