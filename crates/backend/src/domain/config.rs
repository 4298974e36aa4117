//! Configuration system for tgindex with per-vault overrides.
//!
//! Config priority: vault-relative (.tgindex/config.toml) > user (~/.config/tgindex/config.toml)

use std::{
  collections::hash_map::DefaultHasher,
  hash::{Hash, Hasher},
  path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::warn;

// ============================================================================
// Project Detection Configuration
// ============================================================================

/// Maps a path fragment to a project name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathMapping {
  /// Substring matched against the vault-relative file path
  pub pattern: String,
  /// Project name assigned on match
  pub project_name: String,
  #[serde(default = "default_true")]
  pub enabled: bool,
}

impl PathMapping {
  pub fn new(pattern: impl Into<String>, project_name: impl Into<String>) -> Self {
    Self {
      pattern: pattern.into(),
      project_name: project_name.into(),
      enabled: true,
    }
  }
}

/// Copies one metadata key onto another while building enhanced metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetadataMapping {
  pub source_key: String,
  pub target_key: String,
  #[serde(default = "default_true")]
  pub enabled: bool,
}

/// Front-matter detection stage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
  pub enabled: bool,
  /// Front-matter key holding the project name (default: "project")
  pub metadata_key: String,
}

impl Default for MetadataConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      metadata_key: "project".to_string(),
    }
  }
}

/// Directory config-file detection stage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFileConfig {
  pub enabled: bool,
  /// Name of the config document looked up next to the file (default: "project.md")
  pub file_name: String,
  /// Walk ancestor directories when the containing directory has no config file
  pub search_recursively: bool,
}

impl Default for ConfigFileConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      file_name: "project.md".to_string(),
      search_recursively: false,
    }
  }
}

/// How the default stage derives a project name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NamingStrategy {
  #[default]
  Filename,
  Foldername,
  Metadata,
}

/// Default-naming detection stage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultNamingConfig {
  pub enabled: bool,
  pub strategy: NamingStrategy,
  pub strip_extension: bool,
  /// Key read by the `metadata` strategy
  pub metadata_key: String,
}

impl Default for DefaultNamingConfig {
  fn default() -> Self {
    Self {
      enabled: false,
      strategy: NamingStrategy::Filename,
      strip_extension: true,
      metadata_key: "project".to_string(),
    }
  }
}

/// Project attribution settings
///
/// Read-only to the engine; a change is applied through
/// `ComputeCoordinator::on_settings_change`, which also drops every cache row
/// whose correctness depends on these settings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
  /// Master switch for project attribution (default: true)
  pub enable_enhanced_project: bool,

  /// Ordered path rules, first match wins
  pub path_mappings: Vec<PathMapping>,

  pub metadata: MetadataConfig,

  pub config_file: ConfigFileConfig,

  pub metadata_mappings: Vec<MetadataMapping>,

  pub default_naming: DefaultNamingConfig,
}

impl Default for ProjectConfig {
  fn default() -> Self {
    Self {
      enable_enhanced_project: true,
      path_mappings: Vec::new(),
      metadata: MetadataConfig::default(),
      config_file: ConfigFileConfig::default(),
      metadata_mappings: Vec::new(),
      default_naming: DefaultNamingConfig::default(),
    }
  }
}

impl ProjectConfig {
  /// Fingerprint of the detection settings.
  ///
  /// Two configs with equal versions resolve every path identically.
  pub fn version(&self) -> u64 {
    let mut hasher = DefaultHasher::new();
    self.hash(&mut hasher);
    hasher.finish()
  }

  /// True if `file_name` is the configured project config document
  pub fn is_config_file(&self, path: &str) -> bool {
    Path::new(path)
      .file_name()
      .and_then(|n| n.to_str())
      .is_some_and(|n| n == self.config_file.file_name)
  }
}

// ============================================================================
// Index Configuration
// ============================================================================

/// Indexing and compute settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
  /// Dispatch work to background workers (default: true)
  pub enable_workers: bool,

  /// Worker pool size, fixed at construction (default: 0 = number of CPUs)
  pub worker_count: usize,

  /// Skip files whose mtime matches the cached record (default: true)
  pub mtime_optimization: bool,

  /// Upper bound on rows in each resolver cache (default: 10000)
  pub max_cache_entries: u64,

  /// Maximum files computed concurrently within one batch (default: 16)
  pub batch_concurrency: usize,

  /// File watcher debounce in milliseconds (default: 500)
  pub watcher_debounce_ms: u64,
}

impl Default for IndexConfig {
  fn default() -> Self {
    Self {
      enable_workers: true,
      worker_count: 0,
      mtime_optimization: true,
      max_cache_entries: 10_000,
      batch_concurrency: 16,
      watcher_debounce_ms: 500,
    }
  }
}

impl IndexConfig {
  /// Resolved worker pool size
  pub fn workers(&self) -> usize {
    if self.worker_count == 0 {
      num_cpus::get().max(1)
    } else {
      self.worker_count
    }
  }
}

// ============================================================================
// Main Configuration
// ============================================================================

/// tgindex configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Project attribution settings
  #[serde(default)]
  pub project: ProjectConfig,

  /// Indexing and worker settings
  #[serde(default)]
  pub index: IndexConfig,
}

impl Config {
  /// Load config for a vault, with fallback to user config
  pub fn load_for_vault(vault_root: &Path) -> Self {
    Self::load_with_source(vault_root).0
  }

  /// Load config for a vault and report which file supplied it.
  ///
  /// A file that is missing, unreadable, or invalid falls through to the next
  /// source.
  pub fn load_with_source(vault_root: &Path) -> (Self, ConfigSource) {
    let vault_config = Self::vault_config_path(vault_root);
    if let Some(config) = Self::read_file(&vault_config) {
      return (config, ConfigSource::Vault(vault_config));
    }

    if let Some(user_config_path) = Self::user_config_path()
      && let Some(config) = Self::read_file(&user_config_path)
    {
      return (config, ConfigSource::User(user_config_path));
    }

    (Self::default(), ConfigSource::Defaults)
  }

  fn read_file(path: &Path) -> Option<Self> {
    if !path.exists() {
      return None;
    }
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
      Ok(config) => Some(config),
      Err(e) => {
        warn!(path = %path.display(), error = %e, "Invalid config file, skipping");
        None
      }
    }
  }

  /// Get the user-level config path
  pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CONFIG_DIR") {
      return Some(PathBuf::from(path).join("config.toml"));
    }

    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
      return Some(PathBuf::from(path).join("tgindex").join("config.toml"));
    }

    dirs::config_dir().map(|p: PathBuf| p.join("tgindex").join("config.toml"))
  }

  /// Get the vault-relative config path
  pub fn vault_config_path(vault_root: &Path) -> PathBuf {
    vault_root.join(".tgindex").join("config.toml")
  }
}

/// Where a loaded [`Config`] came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
  Vault(PathBuf),
  User(PathBuf),
  Defaults,
}

impl std::fmt::Display for ConfigSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ConfigSource::Vault(path) | ConfigSource::User(path) => write!(f, "{}", path.display()),
      ConfigSource::Defaults => write!(f, "defaults"),
    }
  }
}

fn default_true() -> bool {
  true
}
