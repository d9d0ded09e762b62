//! PDF saving.
//!
//! Documents are serialized on the blocking pool. With atomic writes on
//! (the default) the bytes go to a sibling `.tmp` file that is renamed over
//! the target only after a successful flush, so a failed merge never leaves
//! a truncated PDF behind.
//!
//! # Examples
//!
//! ```no_run
//! use docbatch::io::{PdfWriter, WriteOptions};
//! use lopdf::Document;
//! use std::path::Path;
//!
//! # async fn example(doc: Document) -> docbatch::Result<()> {
//! let writer = PdfWriter::with_options(WriteOptions::default());
//! let stats = writer.save(doc, Path::new("out/guide.pdf")).await?;
//! println!("wrote {} bytes", stats.file_size);
//! # Ok(())
//! # }
//! ```

use lopdf::Document;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::task;

use crate::config::{CompressionOptions, CompressionQuality};
use crate::error::{DocBatchError, Result};

/// How a document is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Write to a temp file, then rename.
    pub atomic: bool,
    /// Compress content streams.
    pub compress: bool,
    /// Objects-per-stream hint derived from the compression quality.
    pub objects_per_stream: u32,
    /// Buffer size in bytes.
    pub buffer_size: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            atomic: true,
            compress: true,
            objects_per_stream: CompressionQuality::Medium.objects_per_stream(),
            buffer_size: 8192,
        }
    }
}

impl From<&CompressionOptions> for WriteOptions {
    fn from(compression: &CompressionOptions) -> Self {
        Self {
            compress: compression.enabled,
            objects_per_stream: compression.quality.objects_per_stream(),
            ..Default::default()
        }
    }
}

/// What a save did.
#[derive(Debug, Clone)]
pub struct WriteStatistics {
    /// Time spent serializing and writing.
    pub write_time: Duration,
    /// Final file size in bytes.
    pub file_size: u64,
    /// Final path.
    pub output_path: PathBuf,
    /// Whether streams were compressed.
    pub compressed: bool,
    /// The objects-per-stream hint in effect.
    pub objects_per_stream: u32,
}

/// Saves lopdf documents to disk.
#[derive(Debug, Clone, Default)]
pub struct PdfWriter {
    options: WriteOptions,
}

impl PdfWriter {
    /// Writer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer with explicit options.
    pub fn with_options(options: WriteOptions) -> Self {
        Self { options }
    }

    /// Options in effect.
    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    /// Save `doc` to `path`, creating the parent directory if needed.
    ///
    /// # Errors
    ///
    /// [`DocBatchError::FailedToCreateOutput`] if the file or its directory
    /// cannot be created, [`DocBatchError::FailedToWrite`] if serialization,
    /// flushing, or the final rename fails.
    pub async fn save(&self, mut doc: Document, path: &Path) -> Result<WriteStatistics> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| DocBatchError::FailedToCreateOutput {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let target = path.to_path_buf();
        let options = self.options.clone();

        let stats = task::spawn_blocking(move || {
            let start = Instant::now();

            if options.compress {
                doc.compress();
            }

            let write_path = if options.atomic {
                target.with_extension("pdf.tmp")
            } else {
                target.clone()
            };

            let file = std::fs::File::create(&write_path).map_err(|source| {
                DocBatchError::FailedToCreateOutput {
                    path: write_path.clone(),
                    source,
                }
            })?;
            let mut writer = std::io::BufWriter::with_capacity(options.buffer_size, file);

            let written = doc
                .save_to(&mut writer)
                .map_err(std::io::Error::other)
                .and_then(|()| writer.flush());
            if let Err(source) = written {
                let _ = std::fs::remove_file(&write_path);
                return Err(DocBatchError::FailedToWrite {
                    path: write_path,
                    source,
                });
            }
            drop(writer);

            if options.atomic {
                std::fs::rename(&write_path, &target).map_err(|source| {
                    DocBatchError::FailedToWrite {
                        path: target.clone(),
                        source,
                    }
                })?;
            }

            let file_size = std::fs::metadata(&target).map(|m| m.len()).unwrap_or(0);

            Ok::<_, DocBatchError>(WriteStatistics {
                write_time: start.elapsed(),
                file_size,
                output_path: target,
                compressed: options.compress,
                objects_per_stream: options.objects_per_stream,
            })
        })
        .await
        .map_err(|e| DocBatchError::other(format!("write task failed: {e}")))??;

        tracing::debug!(
            path = %stats.output_path.display(),
            bytes = stats.file_size,
            compressed = stats.compressed,
            "saved PDF"
        );
        Ok(stats)
    }
}
