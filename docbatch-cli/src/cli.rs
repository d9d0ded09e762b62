//! Command-line surface of docbatch.
//!
//! Flags become the highest-priority configuration layer. A flag that is
//! not given leaves lower layers untouched.

use clap::{Parser, Subcommand};
use docbatch::config::{PageFormat, PartialConfig, PartialFeatures, PartialInput, PartialOptions, PartialOutput};
use std::path::PathBuf;

/// Batch-convert Markdown/HTML documents to PDF and merge PDFs per directory.
///
/// Settings are read from built-in defaults, ~/.docbatch/config.json, a
/// project config file (docbatch.config.{json,yaml,yml,toml} or
/// config.json), DOCBATCH_* environment variables, and finally these flags.
#[derive(Parser, Debug)]
#[command(name = "docbatch")]
#[command(version)]
#[command(about = "Batch-convert documents to PDF and merge PDFs per directory", long_about = None)]
#[command(author)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// What to do
    #[command(subcommand)]
    pub command: Command,

    /// Input root directory
    #[arg(short, long, global = true, value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Output root directory
    #[arg(short, long, global = true, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Use this config file instead of searching the working directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Renderer theme
    #[arg(short, long, global = true, value_name = "NAME")]
    pub theme: Option<String>,

    /// Tasks run at the same time (1-10)
    #[arg(long, global = true, value_name = "N", allow_negative_numbers = true)]
    pub concurrent: Option<i64>,

    /// Per-file render timeout in milliseconds (0 disables it)
    #[arg(long, global = true, value_name = "MS", allow_negative_numbers = true)]
    pub timeout: Option<i64>,

    /// Paper size: A3, A4, A5, Letter, Legal, Tabloid
    #[arg(long, global = true, value_name = "FORMAT")]
    pub format: Option<PageFormat>,

    /// Replace existing outputs instead of skipping them
    #[arg(long, global = true)]
    pub overwrite: bool,

    /// Only convert sources newer than their output
    #[arg(long, global = true)]
    pub incremental: bool,

    /// Show per-file progress and debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Convert Markdown files to PDF
    Convert,
    /// Convert HTML files to PDF
    Html,
    /// Merge the PDFs of every directory into one PDF per directory
    Merge,
    /// Write a default docbatch.config.json to the working directory
    Init {
        /// Replace an existing config file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// The configuration layer these flags describe.
    pub fn overrides(&self) -> PartialConfig {
        let input = self.input.clone().map(|path| PartialInput {
            path: Some(path),
            ..Default::default()
        });
        let output = self.output.clone().map(|path| PartialOutput {
            path: Some(path),
            ..Default::default()
        });

        let options = PartialOptions {
            concurrent: self.concurrent,
            timeout: self.timeout,
            format: self.format,
            theme: self.theme.clone(),
            overwrite: self.overwrite.then_some(true),
            ..Default::default()
        };
        let features = PartialFeatures {
            incremental: self.incremental.then_some(true),
            ..Default::default()
        };

        PartialConfig {
            input,
            output,
            options: (options != PartialOptions::default()).then_some(options),
            features: (features != PartialFeatures::default()).then_some(features),
        }
    }
}
