// File index for mtime-keyed task caching
//
// One record per document path, holding the last observed modification time
// and the task list parsed at that time. A record can be in three states:
// - valid: mtime + tasks (an empty task list is a valid "no tasks" result)
// - orphaned: mtime only, written before parsing finished
// - absent: never indexed, or dropped on delete/rename
//
// Writes are last-writer-wins by mtime: a write carrying an older mtime than
// the stored record is ignored.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use tracing::{debug, trace};

use crate::domain::task::Task;

/// Cached state for one document
#[derive(Debug, Clone)]
pub struct FileRecord {
  pub path: String,
  /// File modification time (Unix timestamp in milliseconds)
  pub last_mtime: i64,
  /// Parsed tasks; `None` marks an orphaned record
  pub cached_tasks: Option<Arc<[Task]>>,
}

impl FileRecord {
  pub fn is_orphaned(&self) -> bool {
    self.cached_tasks.is_none()
  }
}

/// Path → record table deciding whether cached tasks are still valid
#[derive(Debug, Default)]
pub struct FileIndex {
  records: DashMap<String, FileRecord>,
}

impl FileIndex {
  pub fn new() -> Self {
    Self::default()
  }

  /// True if `path` was never indexed or was indexed at a different mtime
  pub fn is_file_changed(&self, path: &str, mtime: i64) -> bool {
    self.records.get(path).is_none_or(|r| r.last_mtime != mtime)
  }

  /// True only for a record at exactly `mtime` that holds a task list
  pub fn has_valid_cache(&self, path: &str, mtime: i64) -> bool {
    self
      .records
      .get(path)
      .is_some_and(|r| r.last_mtime == mtime && r.cached_tasks.is_some())
  }

  /// Cached tasks if the record is valid for `mtime`
  pub fn cached_tasks(&self, path: &str, mtime: i64) -> Option<Arc<[Task]>> {
    let record = self.records.get(path)?;
    if record.last_mtime != mtime {
      return None;
    }
    record.cached_tasks.clone()
  }

  /// Replace the record for `path` with `tasks` parsed at `mtime`.
  ///
  /// Returns false if a record with a newer mtime already exists.
  #[tracing::instrument(level = "trace", skip(self, tasks))]
  pub fn update_index_with_tasks(&self, path: &str, tasks: impl Into<Arc<[Task]>>, mtime: i64) -> bool {
    let record = FileRecord {
      path: path.to_string(),
      last_mtime: mtime,
      cached_tasks: Some(tasks.into()),
    };
    self.write(record)
  }

  /// Record `mtime` for `path` before its tasks are known.
  ///
  /// The record stays orphaned until `update_index_with_tasks` follows.
  pub fn update_file_mtime(&self, path: &str, mtime: i64) -> bool {
    let record = FileRecord {
      path: path.to_string(),
      last_mtime: mtime,
      cached_tasks: None,
    };
    self.write(record)
  }

  fn write(&self, record: FileRecord) -> bool {
    match self.records.entry(record.path.clone()) {
      Entry::Occupied(mut existing) => {
        if existing.get().last_mtime > record.last_mtime {
          debug!(
            path = %record.path,
            stored = existing.get().last_mtime,
            incoming = record.last_mtime,
            "Ignoring write older than stored record"
          );
          return false;
        }
        existing.insert(record);
      }
      Entry::Vacant(slot) => {
        slot.insert(record);
      }
    }
    true
  }

  /// Drop the record for `path` (file deleted or renamed away)
  pub fn cleanup_file_cache(&self, path: &str) -> bool {
    let removed = self.records.remove(path).is_some();
    if removed {
      trace!(path = %path, "Dropped file index record");
    }
    removed
  }

  pub fn get_file_last_mtime(&self, path: &str) -> Option<i64> {
    self.records.get(path).map(|r| r.last_mtime)
  }

  pub fn get_record(&self, path: &str) -> Option<FileRecord> {
    self.records.get(path).map(|r| r.clone())
  }

  /// Remove every orphaned record. Returns the number removed.
  pub fn validate_cache_consistency(&self) -> usize {
    let before = self.records.len();
    self.records.retain(|_, record| !record.is_orphaned());
    let removed = before.saturating_sub(self.records.len());
    if removed > 0 {
      debug!(removed, "Purged orphaned file index records");
    }
    removed
  }

  /// Number of records (valid and orphaned)
  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  /// Total tasks across valid records
  pub fn task_count(&self) -> usize {
    self
      .records
      .iter()
      .filter_map(|r| r.cached_tasks.as_ref().map(|t| t.len()))
      .sum()
  }

  pub fn clear(&self) {
    self.records.clear();
  }
}
