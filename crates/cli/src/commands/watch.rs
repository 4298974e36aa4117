//! Watch command: keep the index current while files change

use std::{path::Path, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tgindex::VaultWatcher;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::Vault;

/// Invalidate on file events and rescan every `rescan_secs`.
///
/// Rescans only re-read files whose mtime changed.
pub async fn cmd_watch(vault: &Path, rescan_secs: u64) -> Result<()> {
  let vault = Vault::open(vault)?;
  let coordinator = Arc::new(vault.coordinator());
  let cancel = CancellationToken::new();

  let debounce = Duration::from_millis(vault.config.index.watcher_debounce_ms);
  let watcher = VaultWatcher::spawn(vault.root.clone(), debounce, coordinator.clone(), cancel.clone())
    .context("Failed to start vault watcher")?;

  println!("Watching {} (Ctrl-C to stop)", vault.root.display());
  let mut rescan = tokio::time::interval(Duration::from_secs(rescan_secs.max(1)));

  loop {
    tokio::select! {
      _ = tokio::signal::ctrl_c() => break,
      _ = rescan.tick() => {
        let files = vault.markdown_files().await;
        let before = coordinator.get_stats();
        let results = coordinator.process_batch(&files).await;
        let after = coordinator.get_stats();
        let tasks: usize = results.values().map(|t| t.len()).sum();
        info!(
          files = files.len(),
          reparsed = after.files_processed - before.files_processed,
          skipped = after.files_skipped - before.files_skipped,
          tasks,
          "Rescan complete"
        );
        println!("{} files, {} tasks", files.len(), tasks);
      }
    }
  }

  cancel.cancel();
  if let Err(e) = watcher.await {
    warn!(error = %e, "Watcher task failed");
  }
  coordinator.destroy().await;
  Ok(())
}
