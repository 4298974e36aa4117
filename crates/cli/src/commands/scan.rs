//! Scan command: parse every document and print its tasks

use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result};
use tgindex::Task;
use tracing::debug;

use super::Vault;

pub async fn cmd_scan(vault: &Path, json: bool, stats: bool) -> Result<()> {
  let vault = Vault::open(vault)?;
  let coordinator = vault.coordinator();

  let files = vault.markdown_files().await;
  debug!(files = files.len(), root = %vault.root.display(), "Scanning vault");

  let results = coordinator.process_batch(&files).await;
  let by_path: BTreeMap<String, Vec<Task>> = results
    .into_iter()
    .filter(|(_, tasks)| !tasks.is_empty())
    .map(|(path, tasks)| (path, tasks.to_vec()))
    .collect();

  if json {
    println!("{}", serde_json::to_string_pretty(&by_path).context("Failed to serialize tasks")?);
  } else {
    for (path, tasks) in &by_path {
      println!("{} ({} tasks)", path, tasks.len());
      for task in tasks {
        let project = task
          .metadata
          .tg_project
          .as_ref()
          .map(|p| format!("  [{}: {}]", p.kind, p.name))
          .unwrap_or_default();
        println!("  L{:<4} [{}] {}{}", task.line, task.status, task.content, project);
      }
    }
  }

  if stats {
    let processing = coordinator.get_stats();
    let memory = coordinator.get_memory_stats();
    eprintln!(
      "{} files processed, {} skipped, {} tasks in {}ms",
      processing.files_processed, processing.files_skipped, processing.tasks_found, processing.total_duration_ms
    );
    eprintln!(
      "file cache: {}, directory cache: {}, workers: {} ({})",
      memory.file_cache_size,
      memory.directory_cache_size,
      memory.active_workers,
      if memory.workers_enabled { "enabled" } else { "disabled" }
    );
  }

  coordinator.destroy().await;
  Ok(())
}
