//! CLI command implementations

mod config;
mod project;
mod scan;
mod watch;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use tgindex::{
  ComputeCoordinator, Config,
  config::ConfigSource,
  storage::{FileStat, FileStorage, FsStorage},
};

pub use config::cmd_config;
pub use project::cmd_project;
pub use scan::cmd_scan;
pub use watch::cmd_watch;

/// A vault directory with its effective configuration
pub struct Vault {
  pub root: PathBuf,
  pub config: Config,
  pub config_source: ConfigSource,
  pub storage: Arc<FsStorage>,
}

impl Vault {
  pub fn open(path: &Path) -> Result<Self> {
    let root = path
      .canonicalize()
      .with_context(|| format!("Vault not found: {}", path.display()))?;
    let (config, config_source) = Config::load_with_source(&root);
    let storage = Arc::new(FsStorage::new(&root));
    Ok(Self {
      root,
      config,
      config_source,
      storage,
    })
  }

  pub fn coordinator(&self) -> ComputeCoordinator {
    ComputeCoordinator::with_storage(self.storage.clone(), self.config.clone())
  }

  /// Every markdown document in the vault, honoring ignore files and
  /// skipping hidden directories
  pub async fn markdown_files(&self) -> Vec<FileStat> {
    let walker = WalkBuilder::new(&self.root)
      .add_custom_ignore_filename(".tgindexignore")
      .build();

    let mut files = Vec::new();
    for entry in walker.flatten() {
      let path = entry.path();
      let is_markdown = entry.file_type().is_some_and(|t| t.is_file())
        && path
          .extension()
          .and_then(|e| e.to_str())
          .is_some_and(|e| e.eq_ignore_ascii_case("md"));
      if !is_markdown {
        continue;
      }
      if let Some(relative) = self.storage.relative(path)
        && let Some(stat) = self.storage.stat(&relative).await
      {
        files.push(stat);
      }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
  }
}
