use std::{
  path::{Path, PathBuf},
  time::UNIX_EPOCH,
};

use async_trait::async_trait;
use tracing::trace;

use super::{FileStat, FileStorage, StorageError};

/// [`FileStorage`] backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct FsStorage {
  root: PathBuf,
}

impl FsStorage {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn full_path(&self, path: &str) -> PathBuf {
    if path.is_empty() {
      self.root.clone()
    } else {
      self.root.join(path)
    }
  }

  /// Convert an absolute path under the root into a vault path
  pub fn relative(&self, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(&self.root).ok()?;
    Some(super::normalize(&relative.to_string_lossy()))
  }
}

#[async_trait]
impl FileStorage for FsStorage {
  async fn stat(&self, path: &str) -> Option<FileStat> {
    let meta = tokio::fs::metadata(self.full_path(path)).await.ok()?;
    if !meta.is_file() {
      return None;
    }
    let mtime = meta
      .modified()
      .ok()
      .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
      .map(|d| d.as_millis() as i64)
      .unwrap_or(0);
    Some(FileStat::new(path, mtime, meta.len()))
  }

  async fn read(&self, path: &str) -> Result<String, StorageError> {
    trace!(path = %path, "Reading file");
    tokio::fs::read_to_string(self.full_path(path)).await.map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(path.to_string())
      } else {
        StorageError::Io {
          path: path.to_string(),
          message: e.to_string(),
        }
      }
    })
  }

  async fn is_dir(&self, path: &str) -> bool {
    tokio::fs::metadata(self.full_path(path))
      .await
      .map(|m| m.is_dir())
      .unwrap_or(false)
  }
}
