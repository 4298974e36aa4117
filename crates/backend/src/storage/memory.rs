use async_trait::async_trait;
use dashmap::DashMap;

use super::{FileStat, FileStorage, StorageError};

#[derive(Debug, Clone)]
struct MemoryFile {
  content: String,
  mtime: i64,
}

/// In-memory [`FileStorage`].
///
/// Directories exist implicitly while they contain at least one file. Reads
/// are counted per path so callers can observe whether content was touched.
#[derive(Debug, Default)]
pub struct MemoryStorage {
  files: DashMap<String, MemoryFile>,
  reads: DashMap<String, usize>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  /// Create or replace a file
  pub fn insert(&self, path: impl Into<String>, content: impl Into<String>, mtime: i64) {
    self.files.insert(
      path.into(),
      MemoryFile {
        content: content.into(),
        mtime,
      },
    );
  }

  /// Replace a file's content and bump its mtime by one
  pub fn modify(&self, path: &str, content: impl Into<String>) -> Option<i64> {
    let mut file = self.files.get_mut(path)?;
    file.content = content.into();
    file.mtime += 1;
    Some(file.mtime)
  }

  pub fn remove(&self, path: &str) -> bool {
    self.files.remove(path).is_some()
  }

  pub fn rename(&self, from: &str, to: &str) -> bool {
    match self.files.remove(from) {
      Some((_, file)) => {
        self.files.insert(to.to_string(), file);
        true
      }
      None => false,
    }
  }

  /// Number of content reads for `path`
  pub fn read_count(&self, path: &str) -> usize {
    self.reads.get(path).map(|r| *r).unwrap_or(0)
  }

  /// Number of content reads across all paths
  pub fn total_reads(&self) -> usize {
    self.reads.iter().map(|r| *r.value()).sum()
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }
}

#[async_trait]
impl FileStorage for MemoryStorage {
  async fn stat(&self, path: &str) -> Option<FileStat> {
    self
      .files
      .get(path)
      .map(|f| FileStat::new(path, f.mtime, f.content.len() as u64))
  }

  async fn read(&self, path: &str) -> Result<String, StorageError> {
    *self.reads.entry(path.to_string()).or_insert(0) += 1;
    self
      .files
      .get(path)
      .map(|f| f.content.clone())
      .ok_or_else(|| StorageError::NotFound(path.to_string()))
  }

  async fn is_dir(&self, path: &str) -> bool {
    if path.is_empty() {
      return true;
    }
    let prefix = format!("{}/", path.trim_end_matches('/'));
    self.files.iter().any(|f| f.key().starts_with(&prefix))
  }
}
