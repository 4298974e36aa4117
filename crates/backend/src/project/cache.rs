//! Resolver caches
//!
//! Three bounded caches, each keyed by path with the remaining key components
//! stored in the value and checked on read:
//!
//! - file metadata: `(path, mtime)` → front matter
//! - enhanced metadata: `(path, mtime, config version)` → attribution + merged metadata
//! - config files: `(config path, mtime)` → parsed config document
//!
//! A lookup whose stored components differ from the requested ones is a miss;
//! the stale row is overwritten by the next insert. Keying by path alone keeps
//! per-path invalidation a single removal.

use std::{collections::BTreeSet, sync::Arc};

use moka::sync::Cache;
use serde::Serialize;

use crate::domain::project::{CachedProjectData, Metadata};

#[derive(Clone)]
struct FileMetadataEntry {
  mtime: i64,
  metadata: Arc<Metadata>,
}

#[derive(Clone)]
struct EnhancedEntry {
  mtime: i64,
  config_version: u64,
  data: CachedProjectData,
}

#[derive(Clone)]
struct ConfigFileEntry {
  mtime: i64,
  data: Arc<Metadata>,
}

/// Entry counts and an estimate of retained bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
  pub file_metadata_cache: CacheSize,
  pub enhanced_metadata_cache: CacheSize,
  pub config_file_cache: CacheSize,
  pub total_memory_usage: MemoryUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheSize {
  pub size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryUsage {
  pub estimated_bytes: usize,
}

pub struct ResolverCache {
  file_metadata: Cache<String, FileMetadataEntry>,
  enhanced: Cache<String, EnhancedEntry>,
  config_files: Cache<String, ConfigFileEntry>,
}

impl ResolverCache {
  /// Create caches holding at most `capacity` rows each (LRU/LFU eviction)
  pub fn new(capacity: u64) -> Self {
    Self {
      file_metadata: Cache::builder().max_capacity(capacity).build(),
      enhanced: Cache::builder().max_capacity(capacity).build(),
      config_files: Cache::builder().max_capacity(capacity).build(),
    }
  }

  // ========================================================================
  // File metadata
  // ========================================================================

  pub fn file_metadata(&self, path: &str, mtime: i64) -> Option<Arc<Metadata>> {
    self
      .file_metadata
      .get(path)
      .filter(|e| e.mtime == mtime)
      .map(|e| e.metadata)
  }

  pub fn insert_file_metadata(&self, path: &str, mtime: i64, metadata: Arc<Metadata>) {
    self
      .file_metadata
      .insert(path.to_string(), FileMetadataEntry { mtime, metadata });
  }

  // ========================================================================
  // Enhanced metadata
  // ========================================================================

  pub fn enhanced(&self, path: &str, mtime: i64, config_version: u64) -> Option<CachedProjectData> {
    self
      .enhanced
      .get(path)
      .filter(|e| e.mtime == mtime && e.config_version == config_version)
      .map(|e| e.data)
  }

  pub fn insert_enhanced(&self, path: &str, mtime: i64, config_version: u64, data: CachedProjectData) {
    self.enhanced.insert(
      path.to_string(),
      EnhancedEntry {
        mtime,
        config_version,
        data,
      },
    );
  }

  // ========================================================================
  // Config files
  // ========================================================================

  pub fn config_file(&self, path: &str, mtime: i64) -> Option<Arc<Metadata>> {
    self
      .config_files
      .get(path)
      .filter(|e| e.mtime == mtime)
      .map(|e| e.data)
  }

  pub fn insert_config_file(&self, path: &str, mtime: i64, data: Arc<Metadata>) {
    self
      .config_files
      .insert(path.to_string(), ConfigFileEntry { mtime, data });
  }

  // ========================================================================
  // Invalidation
  // ========================================================================

  /// Drop the file-metadata and enhanced rows for one path
  pub fn invalidate_path(&self, path: &str) {
    self.file_metadata.invalidate(path);
    self.enhanced.invalidate(path);
  }

  /// Drop a parsed config document and every enhanced row that may have
  /// inherited from it
  pub fn invalidate_config_file(&self, path: &str) {
    self.config_files.invalidate(path);
    Self::clear_all(&self.enhanced);
  }

  pub fn invalidate_all(&self) {
    Self::clear_all(&self.file_metadata);
    Self::clear_all(&self.enhanced);
    Self::clear_all(&self.config_files);
  }

  // Removes rows one by one so reads and counts reflect the clear immediately
  fn clear_all<V: Clone + Send + Sync + 'static>(cache: &Cache<String, V>) {
    let keys: Vec<Arc<String>> = cache.iter().map(|(k, _)| k).collect();
    for key in keys {
      cache.invalidate(key.as_str());
    }
  }

  // ========================================================================
  // Introspection
  // ========================================================================

  /// Every path with a file-metadata, enhanced, or config-file row
  pub fn cached_paths(&self) -> BTreeSet<String> {
    self
      .file_metadata
      .iter()
      .map(|(k, _)| (*k).clone())
      .chain(self.enhanced.iter().map(|(k, _)| (*k).clone()))
      .chain(self.config_files.iter().map(|(k, _)| (*k).clone()))
      .collect()
  }

  pub fn has_config_file(&self, path: &str) -> bool {
    self.config_files.contains_key(path)
  }

  pub fn file_metadata_len(&self) -> usize {
    self.file_metadata.iter().count()
  }

  pub fn enhanced_len(&self) -> usize {
    self.enhanced.iter().count()
  }

  pub fn config_file_len(&self) -> usize {
    self.config_files.iter().count()
  }

  pub fn stats(&self) -> CacheStats {
    let metadata_bytes = |path: &str, metadata: &Metadata| {
      path.len() + serde_json::to_string(metadata).map(|s| s.len()).unwrap_or(0)
    };

    let mut estimated_bytes = 0;
    for (path, entry) in self.file_metadata.iter() {
      estimated_bytes += metadata_bytes(&path, &entry.metadata);
    }
    for (path, entry) in self.enhanced.iter() {
      estimated_bytes += metadata_bytes(&path, &entry.data.enhanced_metadata);
      if let Some(project) = &entry.data.tg_project {
        estimated_bytes += project.name.len() + project.source.len();
      }
    }
    for (path, entry) in self.config_files.iter() {
      estimated_bytes += metadata_bytes(&path, &entry.data);
    }

    CacheStats {
      file_metadata_cache: CacheSize {
        size: self.file_metadata_len(),
      },
      enhanced_metadata_cache: CacheSize {
        size: self.enhanced_len(),
      },
      config_file_cache: CacheSize {
        size: self.config_file_len(),
      },
      total_memory_usage: MemoryUsage { estimated_bytes },
    }
  }
}
