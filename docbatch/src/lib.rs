//! docbatch - batch-convert documents to PDF and merge PDFs per directory.
//!
//! The library holds every stage of a run:
//!
//! - layered configuration resolution ([`config::ConfigResolver`])
//! - recursive discovery of source files ([`scan::FileTreeScanner`])
//! - chunked, bounded-concurrency execution ([`batch::BatchScheduler`])
//! - Markdown/HTML conversion through a pluggable renderer ([`convert`])
//! - per-directory PDF merging backed by `lopdf` ([`merge`])
//!
//! # Examples
//!
//! ## Convert a tree of Markdown files
//!
//! ```no_run
//! use docbatch::config::{ConfigResolver, PartialConfig};
//! use docbatch::context::RunContext;
//! use docbatch::convert::{CommandRenderer, ConversionKind, ConvertService};
//! use std::sync::Arc;
//!
//! # async fn example() -> docbatch::Result<()> {
//! let config = ConfigResolver::new().load(PartialConfig::default()).await?;
//! let service = ConvertService::new(config, RunContext::new(), Arc::new(CommandRenderer::default()));
//! let summary = service.convert_all(ConversionKind::Markdown).await?;
//! println!("{} of {} converted", summary.success, summary.total);
//! # Ok(())
//! # }
//! ```
//!
//! ## Merge the PDFs of every directory
//!
//! ```no_run
//! use docbatch::config::Config;
//! use docbatch::context::RunContext;
//! use docbatch::merge::MergeCoordinator;
//! use std::sync::Arc;
//!
//! # async fn example() -> docbatch::Result<()> {
//! let config = Arc::new(Config::default());
//! let coordinator = MergeCoordinator::new(config.clone(), RunContext::new())?;
//! let summary = coordinator
//!     .merge_all(&config.input.path, &config.output.path)
//!     .await?;
//! println!("{:.1}% merged", summary.success_rate);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod config;
pub mod context;
pub mod convert;
pub mod error;
pub mod io;
pub mod merge;
pub mod output;
pub mod scan;
pub mod summary;
pub mod validation;

pub use config::Config;
pub use context::{RunContext, RunEvent};
pub use error::{DocBatchError, Result};
pub use summary::{Summary, TaskResult};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
