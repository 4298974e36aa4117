use std::sync::{Arc, RwLock};

use tracing::{debug, trace, warn};

use super::{
  cache::{CacheStats, ResolverCache},
  detect,
};
use crate::{
  domain::{
    config::ProjectConfig,
    project::{CachedProjectData, Metadata, ProjectAttribution},
  },
  storage::{FileStorage, MetadataSource, join, parent_dir},
};

/// Nearest project config document for a file
struct ConfigDocument {
  path: String,
  data: Arc<Metadata>,
}

/// Resolves which project a document belongs to and builds its enhanced
/// metadata.
///
/// Every stage failure (unreadable file, missing directory) is logged and
/// treated as "no match"; resolution always terminates.
pub struct ProjectResolver {
  storage: Arc<dyn FileStorage>,
  metadata_source: Arc<dyn MetadataSource>,
  config: RwLock<Arc<ProjectConfig>>,
  cache: ResolverCache,
}

impl ProjectResolver {
  pub fn new(
    storage: Arc<dyn FileStorage>,
    metadata_source: Arc<dyn MetadataSource>,
    config: ProjectConfig,
    max_cache_entries: u64,
  ) -> Self {
    Self {
      storage,
      metadata_source,
      config: RwLock::new(Arc::new(config)),
      cache: ResolverCache::new(max_cache_entries),
    }
  }

  /// Snapshot of the active settings
  pub fn config(&self) -> Arc<ProjectConfig> {
    self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
  }

  /// Replace the settings and drop every cached row
  pub fn set_config(&self, config: ProjectConfig) {
    *self.config.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(config);
    self.clear_cache(None);
  }

  pub fn set_enhanced_enabled(&self, enabled: bool) {
    let mut config = (*self.config()).clone();
    config.enable_enhanced_project = enabled;
    self.set_config(config);
  }

  pub fn is_enhanced_project_enabled(&self) -> bool {
    self.config().enable_enhanced_project
  }

  // ========================================================================
  // Attribution
  // ========================================================================

  /// Run the detection chain: path → metadata → config file → default
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn determine_tg_project(&self, path: &str) -> Option<ProjectAttribution> {
    let config = self.config();
    if !config.enable_enhanced_project {
      return None;
    }
    if let Some(attribution) = detect::match_path(path, &config.path_mappings) {
      return Some(attribution);
    }
    let raw = self.get_file_metadata(path).await;
    let (attribution, _) = self.detect(path, &config, &raw, false).await;
    attribution
  }

  /// Stage chain. With `want_document` the config document is loaded even
  /// when an earlier stage already matched, for inheritance.
  async fn detect(
    &self,
    path: &str,
    config: &ProjectConfig,
    raw: &Metadata,
    want_document: bool,
  ) -> (Option<ProjectAttribution>, Option<ConfigDocument>) {
    let mut attribution = detect::match_path(path, &config.path_mappings);

    if attribution.is_none() && config.metadata.enabled {
      attribution = detect::match_metadata(raw, &config.metadata.metadata_key);
    }

    let mut document = None;
    if config.config_file.enabled && (attribution.is_none() || want_document) {
      document = self.find_config_document(path, config).await;
      if attribution.is_none()
        && let Some(doc) = &document
      {
        attribution = detect::match_config(&doc.data, &config.metadata.metadata_key, &config.config_file.file_name);
      }
    }

    if attribution.is_none() && config.default_naming.enabled {
      attribution = detect::default_name(path, raw, &config.default_naming);
    }

    if let Some(attribution) = &attribution {
      trace!(path = %path, kind = %attribution.kind, name = %attribution.name, "Resolved project");
    }
    (attribution, document)
  }

  /// Locate the config document for `path`: its own directory, then ancestors
  /// when recursive search is on. A missing directory ends the walk.
  async fn find_config_document(&self, path: &str, config: &ProjectConfig) -> Option<ConfigDocument> {
    let file_name = &config.config_file.file_name;
    let mut dir = parent_dir(path)?;

    loop {
      if !self.storage.is_dir(dir).await {
        debug!(path = %path, dir = %dir, "Directory missing during config search");
        return None;
      }

      let candidate = join(dir, file_name);
      if let Some(stat) = self.storage.stat(&candidate).await {
        let data = self.load_config_document(&candidate, stat.mtime).await?;
        return Some(ConfigDocument { path: candidate, data });
      }

      if !config.config_file.search_recursively {
        return None;
      }
      dir = parent_dir(dir)?;
    }
  }

  async fn load_config_document(&self, path: &str, mtime: i64) -> Option<Arc<Metadata>> {
    if let Some(data) = self.cache.config_file(path, mtime) {
      return Some(data);
    }

    match self.storage.read(path).await {
      Ok(content) => {
        let data = Arc::new(detect::parse_config_document(&content));
        self.cache.insert_config_file(path, mtime, data.clone());
        Some(data)
      }
      Err(e) => {
        warn!(path = %path, error = %e, "Failed to read project config file");
        None
      }
    }
  }

  // ========================================================================
  // Metadata
  // ========================================================================

  /// Raw front matter for `path`.
  ///
  /// Repeated calls at an unchanged mtime return the same `Arc`.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn get_file_metadata(&self, path: &str) -> Arc<Metadata> {
    let Some(stat) = self.storage.stat(path).await else {
      return Arc::new(Metadata::new());
    };

    if let Some(metadata) = self.cache.file_metadata(path, stat.mtime) {
      return metadata;
    }

    let metadata = Arc::new(self.metadata_source.file_metadata(path).await.unwrap_or_default());
    self.cache.insert_file_metadata(path, stat.mtime, metadata.clone());
    metadata
  }

  /// Front matter merged with inherited config data and mappings
  pub async fn get_enhanced_metadata(&self, path: &str) -> Arc<Metadata> {
    self.project_data(path).await.enhanced_metadata
  }

  /// Cached attribution + enhanced metadata, if current for the file's mtime
  /// and the active settings
  pub async fn cached_project_data(&self, path: &str) -> Option<CachedProjectData> {
    let stat = self.storage.stat(path).await?;
    self.cache.enhanced(path, stat.mtime, self.config().version())
  }

  /// Attribution + enhanced metadata, computed on a cache miss
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn project_data(&self, path: &str) -> CachedProjectData {
    let config = self.config();
    let version = config.version();
    let mtime = self.storage.stat(path).await.map(|s| s.mtime);

    if let Some(mtime) = mtime
      && let Some(data) = self.cache.enhanced(path, mtime, version)
    {
      return data;
    }

    let raw = self.get_file_metadata(path).await;
    let data = if config.enable_enhanced_project {
      let (attribution, document) = self.detect(path, &config, &raw, true).await;
      let enhanced = detect::merge_enhanced(
        &raw,
        document.as_ref().map(|d| d.data.as_ref()),
        &config.metadata_mappings,
        attribution.as_ref(),
        &config.metadata.metadata_key,
      );
      if let Some(doc) = &document {
        trace!(path = %path, config = %doc.path, "Inherited project config");
      }
      CachedProjectData::new(attribution, enhanced)
    } else {
      CachedProjectData::new(None, raw)
    };

    // A missing file is resolved but never cached
    if let Some(mtime) = mtime {
      self.cache.insert_enhanced(path, mtime, version, data.clone());
    }
    data
  }

  // ========================================================================
  // Cache maintenance
  // ========================================================================

  /// Drop the rows for one path, or every row
  pub fn clear_cache(&self, path: Option<&str>) {
    match path {
      Some(path) => self.cache.invalidate_path(path),
      None => self.cache.invalidate_all(),
    }
  }

  /// Drop a config document and every enhanced row that could inherit from it
  pub fn invalidate_config_file(&self, path: &str) {
    self.cache.invalidate_config_file(path);
  }

  /// Remove rows whose backing file no longer exists. Returns the number of
  /// paths removed.
  pub async fn clear_stale_entries(&self) -> usize {
    let mut removed = 0;
    for path in self.cache.cached_paths() {
      if self.storage.stat(&path).await.is_some() {
        continue;
      }
      if self.cache.has_config_file(&path) {
        self.cache.invalidate_config_file(&path);
      }
      self.cache.invalidate_path(&path);
      removed += 1;
    }
    if removed > 0 {
      debug!(removed, "Cleared stale resolver entries");
    }
    removed
  }

  pub fn get_cache_stats(&self) -> CacheStats {
    self.cache.stats()
  }

  /// Number of cached project config documents
  pub fn directory_cache_size(&self) -> usize {
    self.cache.config_file_len()
  }
}
