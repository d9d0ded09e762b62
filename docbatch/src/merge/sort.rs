//! Pre-merge ordering of a directory's files.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::{SortDirection, SortMethod, SortOptions};

#[derive(Debug)]
struct SortEntry {
    path: PathBuf,
    modified: SystemTime,
    size: u64,
}

/// Case-insensitive file name comparison with a byte-wise tie-break.
pub fn compare_names(a: &Path, b: &Path) -> Ordering {
    let name = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    let (a, b) = (name(a), name(b));
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(&b))
}

/// Order `files` according to `options`.
///
/// Returns the input unchanged when sorting is disabled. Metadata is read
/// once per file up front; a file whose metadata cannot be read sorts as
/// the oldest and smallest.
pub async fn sort_files(files: Vec<PathBuf>, options: &SortOptions) -> Vec<PathBuf> {
    if !options.enabled {
        return files;
    }

    let mut entries = Vec::with_capacity(files.len());
    for path in files {
        let metadata = tokio::fs::metadata(&path).await.ok();
        entries.push(SortEntry {
            modified: metadata
                .as_ref()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH),
            size: metadata.map(|m| m.len()).unwrap_or(0),
            path,
        });
    }

    entries.sort_by(|a, b| {
        let primary = match options.method {
            SortMethod::Name => Ordering::Equal,
            SortMethod::Date => a.modified.cmp(&b.modified),
            SortMethod::Size => a.size.cmp(&b.size),
        };
        primary.then_with(|| compare_names(&a.path, &b.path))
    });

    if options.direction == SortDirection::Desc {
        entries.reverse();
    }

    entries.into_iter().map(|e| e.path).collect()
}
