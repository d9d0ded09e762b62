//! PDF loading.
//!
//! Files are read with `tokio::fs` and parsed by lopdf on the blocking pool.
//! [`PdfReader::load_all`] keeps results in input order so a sorted file
//! list stays sorted after loading.
//!
//! # Examples
//!
//! ```no_run
//! use docbatch::io::PdfReader;
//! use std::path::PathBuf;
//!
//! # async fn example() {
//! let reader = PdfReader::new();
//! let paths = vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")];
//! let (results, stats) = reader.load_all(&paths, 4).await;
//! println!("loaded {} of {} ({} pages)", stats.success_count, results.len(), stats.total_pages);
//! # }
//! ```

use futures::stream::{self, StreamExt};
use lopdf::Document;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{DocBatchError, Result};

/// A parsed PDF and what is known about it.
#[derive(Debug)]
pub struct LoadedPdf {
    /// The parsed document.
    pub document: Document,
    /// Source file.
    pub path: PathBuf,
    /// Number of pages.
    pub page_count: usize,
    /// Read plus parse time.
    pub load_time: Duration,
    /// File size in bytes.
    pub file_size: u64,
}

/// Outcome of loading one file.
pub type LoadResult = Result<LoadedPdf>;

/// Aggregate numbers for a batch load.
#[derive(Debug, Clone, Default)]
pub struct LoadStatistics {
    /// Files parsed successfully.
    pub success_count: usize,
    /// Files that failed.
    pub failure_count: usize,
    /// Wall time for the whole batch.
    pub total_time: Duration,
    /// Bytes read from successful files.
    pub total_size: u64,
    /// Pages across successful files.
    pub total_pages: usize,
}

impl LoadStatistics {
    fn from_results(results: &[LoadResult], total_time: Duration) -> Self {
        let mut stats = Self {
            total_time,
            ..Default::default()
        };
        for result in results {
            match result {
                Ok(loaded) => {
                    stats.success_count += 1;
                    stats.total_size += loaded.file_size;
                    stats.total_pages += loaded.page_count;
                }
                Err(_) => stats.failure_count += 1,
            }
        }
        stats
    }
}

/// Loads PDF files into lopdf documents, rejecting documents without pages.
#[derive(Debug, Clone, Default)]
pub struct PdfReader;

impl PdfReader {
    /// New reader.
    pub fn new() -> Self {
        Self
    }

    /// Load one PDF.
    ///
    /// # Errors
    ///
    /// [`DocBatchError::FileNotFound`] when the file is missing, otherwise
    /// [`DocBatchError::FailedToLoadPdf`] when it cannot be read or parsed or
    /// has no pages.
    pub async fn load(&self, path: &Path) -> Result<LoadedPdf> {
        let start = Instant::now();

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DocBatchError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                DocBatchError::failed_to_load_pdf(path, e.to_string())
            }
        })?;
        let file_size = bytes.len() as u64;

        let owned = path.to_path_buf();
        let document = tokio::task::spawn_blocking(move || Document::load_mem(&bytes))
            .await
            .map_err(|e| DocBatchError::other(format!("load task failed: {e}")))?
            .map_err(|e| DocBatchError::failed_to_load_pdf(&owned, e.to_string()))?;

        let page_count = document.get_pages().len();
        if page_count == 0 {
            return Err(DocBatchError::failed_to_load_pdf(path, "PDF has no pages"));
        }

        tracing::debug!(path = %path.display(), pages = page_count, "loaded PDF");

        Ok(LoadedPdf {
            document,
            path: path.to_path_buf(),
            page_count,
            load_time: start.elapsed(),
            file_size,
        })
    }

    /// Load every path with up to `workers` reads in flight.
    ///
    /// Results are in the same order as `paths`.
    pub async fn load_all(
        &self,
        paths: &[PathBuf],
        workers: usize,
    ) -> (Vec<LoadResult>, LoadStatistics) {
        let start = Instant::now();

        let results: Vec<LoadResult> = stream::iter(paths.iter().map(|path| self.load(path)))
            .buffered(workers.max(1))
            .collect()
            .await;

        let stats = LoadStatistics::from_results(&results, start.elapsed());
        (results, stats)
    }
}
