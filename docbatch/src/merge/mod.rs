//! Directory-aware PDF merging.
//!
//! [`MergeCoordinator::merge_all`] scans the input tree once, then visits it
//! depth-first. Every directory below the root that directly contains PDFs
//! yields `<output root>/<directory name>.pdf`. The root itself is never
//! merged. A failure in one directory is recorded and the walk goes on.
//!
//! # Examples
//!
//! ```no_run
//! use docbatch::config::Config;
//! use docbatch::context::RunContext;
//! use docbatch::merge::MergeCoordinator;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> docbatch::Result<()> {
//! let coordinator = MergeCoordinator::new(Arc::new(Config::default()), RunContext::new())?;
//! let summary = coordinator.merge_all(Path::new("./pdfs"), Path::new("./merged")).await?;
//! println!("{} of {} directories merged", summary.success, summary.total);
//! # Ok(())
//! # }
//! ```

mod pdf;
mod sort;

pub use pdf::PdfMerger;
pub use sort::{compare_names, sort_files};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

use crate::config::Config;
use crate::context::{RunContext, RunEvent};
use crate::error::{DocBatchError, Result};
use crate::io::{PdfReader, PdfWriter, WriteOptions, WriteStatistics};
use crate::scan::{FileFilter, FileTree, FileTreeScanner};
use crate::summary::{Summary, TaskResult};

/// Extension of the files a merge consumes.
pub const PDF_EXTENSION: &str = ".pdf";

/// What merging one directory did.
#[derive(Debug, Clone)]
pub struct MergeStatistics {
    /// Input files merged, in merge order.
    pub merged_files: Vec<PathBuf>,
    /// Pages in the output.
    pub total_pages: usize,
    /// Bytes read.
    pub input_size: u64,
    /// Time spent loading inputs.
    pub load_time: Duration,
    /// Load, merge, and write time.
    pub merge_time: Duration,
    /// Output details.
    pub write: WriteStatistics,
}

/// Walks a directory tree and merges each directory's PDFs.
#[derive(Debug)]
pub struct MergeCoordinator {
    config: Arc<Config>,
    context: RunContext,
    scanner: FileTreeScanner,
    reader: PdfReader,
    merger: PdfMerger,
    writer: PdfWriter,
}

impl MergeCoordinator {
    /// Coordinator for `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if an input filter does not compile.
    pub fn new(config: Arc<Config>, context: RunContext) -> Result<Self> {
        let filter = FileFilter::new(&config.input.filters.include, &config.input.filters.exclude)?;
        let scanner = FileTreeScanner::new(&[PDF_EXTENSION.to_string()]).with_filter(filter);
        let writer = PdfWriter::with_options(WriteOptions::from(&config.options.compression));

        Ok(Self {
            config,
            context,
            scanner,
            reader: PdfReader::new(),
            merger: PdfMerger::new(),
            writer,
        })
    }

    /// Output path for a directory.
    pub fn output_for(dir: &Path, output_root: &Path) -> PathBuf {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "merged".to_string());
        output_root.join(format!("{name}.pdf"))
    }

    /// Merge every non-root directory under `input_root` that directly
    /// contains PDFs.
    ///
    /// # Errors
    ///
    /// Only a failure to scan `input_root` itself is returned as an error.
    /// Per-directory failures end up in the summary.
    pub async fn merge_all(&self, input_root: &Path, output_root: &Path) -> Result<Summary> {
        async {
            let started = Instant::now();
            let tree = self.scanner.scan_tree(input_root).await?;
            tracing::info!(
                root = %input_root.display(),
                directories = tree.len(),
                "merging directories"
            );

            let mut results = Vec::new();
            for id in tree.depth_first() {
                if id == FileTree::ROOT {
                    continue;
                }
                let node = tree.node(id);
                if node.files.is_empty() {
                    continue;
                }

                let output = Self::output_for(&node.path, output_root);
                results.push(self.merge_node(&node.path, &node.files, output).await);
            }

            Ok::<_, DocBatchError>(Summary::from_results(&results, started))
        }
        .instrument(self.context.span())
        .await
    }

    async fn merge_node(&self, dir: &Path, files: &[PathBuf], output: PathBuf) -> TaskResult {
        if !self.config.options.overwrite && tokio::fs::try_exists(&output).await.unwrap_or(false) {
            tracing::info!(dir = %dir.display(), output = %output.display(), "output exists, skipping directory");
            self.context.emit(RunEvent::DirectorySkipped {
                dir: dir.to_path_buf(),
                output: output.clone(),
            });
            return TaskResult::skipped(dir, output);
        }

        let started = Instant::now();
        match self.merge_directory(files, &output).await {
            Ok(stats) => {
                tracing::info!(
                    dir = %dir.display(),
                    output = %output.display(),
                    files = stats.merged_files.len(),
                    pages = stats.total_pages,
                    "merged directory"
                );
                self.context.emit(RunEvent::DirectoryMerged {
                    dir: dir.to_path_buf(),
                    output: output.clone(),
                    files: stats.merged_files.len(),
                    bytes: stats.write.file_size,
                });
                TaskResult::ok(dir, output, started.elapsed())
            }
            Err(err) => {
                tracing::warn!(dir = %dir.display(), error = %err, "directory merge failed");
                TaskResult::failed(dir, err.to_string(), started.elapsed())
            }
        }
    }

    /// Sort, load, merge, and write one group of PDFs.
    ///
    /// Every input is loaded before the output is written.
    ///
    /// # Errors
    ///
    /// Fails on the first input that cannot be loaded, or when merging or
    /// writing fails.
    pub async fn merge_directory(&self, files: &[PathBuf], output: &Path) -> Result<MergeStatistics> {
        let started = Instant::now();
        let ordered = sort_files(files.to_vec(), &self.config.options.sort).await;

        let (loaded, load_stats) = self
            .reader
            .load_all(&ordered, self.config.options.concurrent)
            .await;
        let documents = loaded
            .into_iter()
            .map(|result| result.map(|pdf| pdf.document))
            .collect::<Result<Vec<_>>>()?;

        if documents.is_empty() {
            return Err(DocBatchError::merge_failed("no PDFs to merge"));
        }

        let merger = self.merger.clone();
        let document = tokio::task::spawn_blocking(move || merger.merge(documents))
            .await
            .map_err(|e| DocBatchError::other(format!("merge task failed: {e}")))??;
        let total_pages = document.get_pages().len();

        let write = self.writer.save(document, output).await?;

        Ok(MergeStatistics {
            merged_files: ordered,
            total_pages,
            input_size: load_stats.total_size,
            load_time: load_stats.total_time,
            merge_time: started.elapsed(),
            write,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SortDirection, SortMethod};
    use crate::io::sample_pdf_bytes;
    use tempfile::TempDir;

    fn write_pdf(path: &Path, pages: usize) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, sample_pdf_bytes(pages)).unwrap();
    }

    fn coordinator(config: Config) -> MergeCoordinator {
        MergeCoordinator::new(Arc::new(config), RunContext::new()).unwrap()
    }

    #[test]
    fn test_output_for_uses_directory_name() {
        assert_eq!(
            MergeCoordinator::output_for(Path::new("/in/chapter-1"), Path::new("/out")),
            PathBuf::from("/out/chapter-1.pdf")
        );
    }

    #[tokio::test]
    async fn test_root_is_never_merged() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        write_pdf(&input.join("loose.pdf"), 1);
        write_pdf(&input.join("part/a.pdf"), 2);

        let output = dir.path().join("out");
        let summary = coordinator(Config::default())
            .merge_all(&input, &output)
            .await
            .unwrap();

        assert_eq!(summary.total, 1);
        assert!(output.join("part.pdf").is_file());
        assert!(!output.join("in.pdf").exists());
    }

    #[tokio::test]
    async fn test_failure_in_one_directory_does_not_stop_walk() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir_all(input.join("broken")).unwrap();
        std::fs::write(input.join("broken/bad.pdf"), b"garbage").unwrap();
        write_pdf(&input.join("broken/nested/ok.pdf"), 1);
        write_pdf(&input.join("good/ok.pdf"), 1);

        let output = dir.path().join("out");
        let summary = coordinator(Config::default())
            .merge_all(&input, &output)
            .await
            .unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.failed, 1);
        assert!(summary.failed_operations[0].path.ends_with("broken"));
        assert!(output.join("nested.pdf").is_file());
        assert!(output.join("good.pdf").is_file());
    }

    #[tokio::test]
    async fn test_existing_output_is_skipped_unless_overwrite() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        write_pdf(&input.join("book/a.pdf"), 1);
        let output = dir.path().join("out");
        std::fs::create_dir_all(&output).unwrap();
        std::fs::write(output.join("book.pdf"), b"existing").unwrap();

        let (context, mut events) = RunContext::with_events();
        let skipping = MergeCoordinator::new(Arc::new(Config::default()), context).unwrap();
        let summary = skipping.merge_all(&input, &output).await.unwrap();
        assert_eq!(summary.success, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(std::fs::read(output.join("book.pdf")).unwrap(), b"existing");
        assert!(matches!(
            events.try_recv().unwrap(),
            RunEvent::DirectorySkipped { .. }
        ));

        let mut config = Config::default();
        config.options.overwrite = true;
        let summary = coordinator(config).merge_all(&input, &output).await.unwrap();
        assert_eq!(summary.skipped, 0);
        assert!(std::fs::read(output.join("book.pdf")).unwrap().starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_merge_directory_respects_sort() {
        let dir = TempDir::new().unwrap();
        let files: Vec<PathBuf> = ["b.pdf", "a.pdf", "c.pdf"]
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                write_pdf(&path, 1);
                path
            })
            .collect();

        let mut config = Config::default();
        config.options.sort.enabled = true;
        config.options.sort.method = SortMethod::Name;
        config.options.sort.direction = SortDirection::Desc;

        let stats = coordinator(config)
            .merge_directory(&files, &dir.path().join("out/all.pdf"))
            .await
            .unwrap();

        let order: Vec<_> = stats
            .merged_files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(order, ["c.pdf", "b.pdf", "a.pdf"]);
        assert_eq!(stats.total_pages, 3);
        assert_eq!(stats.write.objects_per_stream, 20);
    }

    #[tokio::test]
    async fn test_missing_input_root_is_error() {
        let dir = TempDir::new().unwrap();
        let result = coordinator(Config::default())
            .merge_all(&dir.path().join("missing"), &dir.path().join("out"))
            .await;
        assert!(matches!(result, Err(DocBatchError::Scan { .. })));
    }
}
