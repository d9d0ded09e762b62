//! Directory scanning.
//!
//! [`FileTreeScanner`] enumerates files under a root whose extension is in
//! the configured set, then applies the include/exclude [`FileFilter`] as a
//! second pass. It can return either a flat list or a [`FileTree`], an arena
//! of directory nodes that records each directory's own matching files and
//! immediate subdirectories.
//!
//! Unreadable subdirectories are logged and contribute nothing. Only a
//! missing or unreadable root is an error.
//!
//! # Examples
//!
//! ```no_run
//! use docbatch::scan::FileTreeScanner;
//! use std::path::Path;
//!
//! # async fn example() -> docbatch::Result<()> {
//! let scanner = FileTreeScanner::new(&[".md".to_string()]);
//! let tree = scanner.scan_tree(Path::new("./docs")).await?;
//! for id in tree.depth_first() {
//!     let node = tree.node(id);
//!     println!("{}: {} files", node.path.display(), node.files.len());
//! }
//! # Ok(())
//! # }
//! ```

use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{DocBatchError, Result};

/// Include/exclude regular expressions tested against the full path string.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl FileFilter {
    /// Compile a filter.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any pattern fails to compile.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let compile = |patterns: &[String]| -> Result<Vec<Regex>> {
            patterns
                .iter()
                .map(|p| Regex::new(p).map_err(DocBatchError::from))
                .collect()
        };

        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// Whether the filter has no patterns at all.
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Keep a path iff it matches some include pattern (when any exist) and
    /// no exclude pattern.
    pub fn accepts(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        let included = self.include.is_empty() || self.include.iter().any(|re| re.is_match(&text));
        included && !self.exclude.iter().any(|re| re.is_match(&text))
    }
}

/// One directory in a [`FileTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirNode {
    /// Directory path.
    pub path: PathBuf,
    /// Matching files directly inside this directory.
    pub files: Vec<PathBuf>,
    /// Immediate subdirectories.
    pub subdirs: Vec<PathBuf>,
    children: Vec<usize>,
}

impl DirNode {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            files: Vec::new(),
            subdirs: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// In-memory directory hierarchy. Node `0` is the scan root; children are
/// referenced by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTree {
    nodes: Vec<DirNode>,
}

impl FileTree {
    /// Index of the root node.
    pub const ROOT: usize = 0;

    fn with_root(root: PathBuf) -> Self {
        Self {
            nodes: vec![DirNode::new(root)],
        }
    }

    fn add_dir(&mut self, parent: usize, path: PathBuf) -> usize {
        let id = self.nodes.len();
        self.nodes[parent].subdirs.push(path.clone());
        self.nodes[parent].children.push(id);
        self.nodes.push(DirNode::new(path));
        id
    }

    /// The root directory node.
    pub fn root(&self) -> &DirNode {
        &self.nodes[Self::ROOT]
    }

    /// Node by index.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this tree.
    pub fn node(&self, id: usize) -> &DirNode {
        &self.nodes[id]
    }

    /// Child node indices of `id`, in name order.
    pub fn children(&self, id: usize) -> &[usize] {
        &self.nodes[id].children
    }

    /// Number of directories in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false; a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node indices in pre-order: a directory comes before its descendants.
    pub fn depth_first(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![Self::ROOT];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.iter().rev());
        }
        order
    }

    /// Every matching file in the tree.
    pub fn files(&self) -> Vec<PathBuf> {
        self.depth_first()
            .into_iter()
            .flat_map(|id| self.nodes[id].files.iter().cloned())
            .collect()
    }
}

/// Scan result, either flat or grouped by directory.
#[derive(Debug, Clone)]
pub enum ScanOutput {
    /// Every matching file.
    Flat(Vec<PathBuf>),
    /// Matching files grouped by directory.
    Tree(FileTree),
}

/// Recursive file enumerator with extension and regex filtering.
#[derive(Debug, Clone)]
pub struct FileTreeScanner {
    extensions: Vec<String>,
    filter: FileFilter,
}

impl FileTreeScanner {
    /// Scanner matching the given extensions, case-insensitively.
    pub fn new(extensions: &[String]) -> Self {
        let mut normalized: Vec<String> = extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        normalized.sort();
        normalized.dedup();

        Self {
            extensions: normalized,
            filter: FileFilter::default(),
        }
    }

    /// Scanner for the configured input extensions and filters.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a filter pattern does not compile.
    pub fn from_config(config: &Config) -> Result<Self> {
        let filter = FileFilter::new(&config.input.filters.include, &config.input.filters.exclude)?;
        Ok(Self::new(&config.input.extensions).with_filter(filter))
    }

    /// Apply an include/exclude filter after extension matching.
    pub fn with_filter(mut self, filter: FileFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Whether `path` has one of the scanner's extensions.
    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }

    /// Scan `root`, flat or grouped by directory.
    ///
    /// # Errors
    ///
    /// Returns [`DocBatchError::Scan`] when the root itself cannot be read.
    pub async fn scan(&self, root: &Path, group_by_dir: bool) -> Result<ScanOutput> {
        let tree = self.scan_tree(root).await?;
        Ok(if group_by_dir {
            ScanOutput::Tree(tree)
        } else {
            ScanOutput::Flat(tree.files())
        })
    }

    /// Every matching file under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`DocBatchError::Scan`] when the root itself cannot be read.
    pub async fn scan_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        Ok(self.scan_tree(root).await?.files())
    }

    /// Matching files grouped into a [`FileTree`].
    ///
    /// # Errors
    ///
    /// Returns [`DocBatchError::Scan`] when the root itself cannot be read.
    pub async fn scan_tree(&self, root: &Path) -> Result<FileTree> {
        let scanner = self.clone();
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || scanner.walk(&root))
            .await
            .map_err(|e| DocBatchError::other(format!("scan task failed: {e}")))?
    }

    fn walk(&self, root: &Path) -> Result<FileTree> {
        let mut tree = FileTree::with_root(root.to_path_buf());
        let mut index: HashMap<PathBuf, usize> = HashMap::new();
        index.insert(root.to_path_buf(), FileTree::ROOT);

        let mut files = Vec::new();

        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    let source = err
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop at scan root"));
                    return Err(DocBatchError::Scan {
                        path: root.to_path_buf(),
                        source,
                    });
                }
                Err(err) => {
                    tracing::warn!(path = ?err.path(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };

            if entry.depth() == 0 {
                if !entry.file_type().is_dir() {
                    return Err(DocBatchError::Scan {
                        path: root.to_path_buf(),
                        source: std::io::Error::other("scan root is not a directory"),
                    });
                }
                continue;
            }

            let Some(parent) = entry.path().parent().and_then(|p| index.get(p)).copied() else {
                continue;
            };

            if entry.file_type().is_dir() {
                let id = tree.add_dir(parent, entry.path().to_path_buf());
                index.insert(entry.path().to_path_buf(), id);
            } else if !self.matches_extension(entry.path()) {
                continue;
            } else if entry.file_type().is_file() || links_to_file(entry.path()) {
                files.push((parent, entry.into_path()));
            } else if entry.path_is_symlink() {
                tracing::debug!(path = %entry.path().display(), "skipping symlink that does not resolve to a file");
            }
        }

        let matched = files.len();
        for (parent, path) in files {
            if self.filter.accepts(&path) {
                tree.nodes[parent].files.push(path);
            }
        }

        tracing::debug!(
            root = %root.display(),
            directories = tree.len(),
            matched,
            kept = tree.nodes.iter().map(|n| n.files.len()).sum::<usize>(),
            "scan complete"
        );
        Ok(tree)
    }
}

/// Whether `path` is a symlink that resolves to a regular file.
fn links_to_file(path: &Path) -> bool {
    path.is_symlink() && std::fs::metadata(path).is_ok_and(|meta| meta.is_file())
}
