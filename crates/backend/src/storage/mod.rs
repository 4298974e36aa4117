//! Storage collaborators
//!
//! The engine never touches the filesystem directly. Everything it reads goes
//! through [`FileStorage`] (stat, content, directory checks) and
//! [`MetadataSource`] (pre-parsed front matter). Paths are vault-relative,
//! `/`-separated strings; the vault root is the empty string.

mod frontmatter;
mod fs;
mod memory;

use async_trait::async_trait;

pub use self::{
  frontmatter::{FrontMatterReader, parse_front_matter, parse_key_values, parse_value, split_front_matter, value_to_string},
  fs::FsStorage,
  memory::MemoryStorage,
};
use crate::domain::project::Metadata;

/// Stat result for a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
  pub path: String,
  /// Modification time (Unix timestamp in milliseconds)
  pub mtime: i64,
  pub size: u64,
}

impl FileStat {
  pub fn new(path: impl Into<String>, mtime: i64, size: u64) -> Self {
    Self {
      path: path.into(),
      mtime,
      size,
    }
  }
}

/// Read access to the document collection
#[async_trait]
pub trait FileStorage: Send + Sync + 'static {
  /// Look up a file; `None` if it does not exist or is a directory
  async fn stat(&self, path: &str) -> Option<FileStat>;

  /// Read a file's full text content
  async fn read(&self, path: &str) -> Result<String, StorageError>;

  /// True if `path` names an existing directory (the root `""` always exists)
  async fn is_dir(&self, path: &str) -> bool;
}

/// Side cache of pre-parsed front matter, independent of the engine's caches
#[async_trait]
pub trait MetadataSource: Send + Sync + 'static {
  /// Front matter for `path`, `None` if the file has none or cannot be read
  async fn file_metadata(&self, path: &str) -> Option<Metadata>;
}

/// Errors raised by storage backends
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
  #[error("File not found: {0}")]
  NotFound(String),
  #[error("IO error reading {path}: {message}")]
  Io { path: String, message: String },
}

// ============================================================================
// Path helpers
// ============================================================================

/// Containing directory of a vault path; `None` for the root itself
pub fn parent_dir(path: &str) -> Option<&str> {
  if path.is_empty() {
    return None;
  }
  match path.trim_end_matches('/').rfind('/') {
    Some(idx) => Some(&path[..idx]),
    None => Some(""),
  }
}

/// Final path component
pub fn file_name(path: &str) -> &str {
  let trimmed = path.trim_end_matches('/');
  match trimmed.rfind('/') {
    Some(idx) => &trimmed[idx + 1..],
    None => trimmed,
  }
}

/// Join a directory and a file name
pub fn join(dir: &str, name: &str) -> String {
  if dir.is_empty() {
    name.to_string()
  } else {
    format!("{}/{}", dir.trim_end_matches('/'), name)
  }
}

/// Normalize separators so Windows-style paths match `/` patterns
pub fn normalize(path: &str) -> String {
  path.replace('\\', "/")
}
