//! Bounded cache of finished conversions.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Default number of entries kept.
pub const DEFAULT_CAPACITY: usize = 100;

/// A source file at a particular modification time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Source path.
    pub source: PathBuf,
    /// Source modification time.
    pub modified: SystemTime,
}

impl CacheKey {
    /// Key for `source` at its current modification time, or `None` when
    /// the file cannot be stat'ed.
    pub async fn for_source(source: &Path) -> Option<Self> {
        let modified = tokio::fs::metadata(source).await.ok()?.modified().ok()?;
        Some(Self {
            source: source.to_path_buf(),
            modified,
        })
    }
}

/// Maps sources to the PDF produced from them. When full, the oldest
/// insertion is evicted.
#[derive(Debug)]
pub struct ResultCache {
    capacity: usize,
    entries: HashMap<CacheKey, PathBuf>,
    order: VecDeque<CacheKey>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ResultCache {
    /// Empty cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Output recorded for `key`.
    pub fn get(&self, key: &CacheKey) -> Option<&Path> {
        self.entries.get(key).map(PathBuf::as_path)
    }

    /// Record `output` for `key`.
    pub fn insert(&mut self, key: CacheKey, output: PathBuf) {
        if self.entries.insert(key.clone(), output).is_some() {
            return;
        }

        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    /// Drop the entry for `key`.
    pub fn remove(&mut self, key: &CacheKey) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
