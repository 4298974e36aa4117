//! Coordinator processing tests: skip decisions, batches, project data.

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use pretty_assertions::assert_eq;
  use serde_json::json;

  use crate::{
    compute::{ComputeCoordinator, __tests__::helpers::*},
    domain::project::AttributionKind,
    storage::{FileStat, FileStorage, MemoryStorage},
  };

  // ==========================================================================
  // process_file / process_batch
  // ==========================================================================

  #[tokio::test]
  async fn test_process_file_populates_index() {
    let storage = vault();
    let coordinator = coordinator(&storage, false);
    let file = stat(&storage, "Projects/Alpha/todo.md").await;

    let tasks = coordinator.process_file(&file).await.unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].content, "draft plan #work");
    assert_eq!(tasks[0].line, 3);
    assert!(tasks[1].completed);

    // Inherited from the directory's project config
    let project = tasks[0].metadata.tg_project.clone().unwrap();
    assert_eq!((project.kind, project.name.as_str()), (AttributionKind::Config, "Alpha"));
    assert_eq!(tasks[0].metadata.project.as_deref(), Some("Alpha"));

    assert!(coordinator.file_index().has_valid_cache("Projects/Alpha/todo.md", file.mtime));
    assert_eq!(coordinator.get_stats().files_processed, 1);
  }

  #[tokio::test]
  async fn test_cached_file_is_not_read() {
    let storage = vault();
    let coordinator = coordinator(&storage, false);
    let file = stat(&storage, "Inbox.md").await;

    let first = coordinator.process_file(&file).await.unwrap();
    let reads = storage.read_count("Inbox.md");

    let second = coordinator.process_file(&file).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(storage.read_count("Inbox.md"), reads);
  }

  #[tokio::test]
  async fn test_files_without_tasks_are_cached() {
    let storage = vault();
    let coordinator = coordinator(&storage, false);
    let file = stat(&storage, "Projects/Alpha/notes.md").await;

    assert!(coordinator.process_file(&file).await.unwrap().is_empty());
    assert!(coordinator.file_index().has_valid_cache("Projects/Alpha/notes.md", file.mtime));

    let reads = storage.read_count("Projects/Alpha/notes.md");
    coordinator.process_file(&file).await.unwrap();
    assert_eq!(storage.read_count("Projects/Alpha/notes.md"), reads);
    assert_eq!(coordinator.get_stats().files_skipped, 1);
  }

  #[tokio::test]
  async fn test_process_batch_skips_cached_files() {
    let storage = vault();
    let coordinator = coordinator(&storage, true);

    let a = stat(&storage, "Projects/Alpha/todo.md").await;
    let b = stat(&storage, "Inbox.md").await;
    let c = stat(&storage, "Projects/Alpha/notes.md").await;

    let cached_a = coordinator.process_file(&a).await.unwrap();
    let cached_b = coordinator.process_file(&b).await.unwrap();
    let reads_a = storage.read_count(&a.path);
    let reads_b = storage.read_count(&b.path);

    let results = coordinator.process_batch(&[a.clone(), b.clone(), c.clone()]).await;

    let stats = coordinator.get_stats();
    assert_eq!(stats.files_skipped, 2);
    assert_eq!(stats.files_processed, 3);
    assert_eq!(stats.batches, 1);

    assert_eq!(storage.read_count(&a.path), reads_a);
    assert_eq!(storage.read_count(&b.path), reads_b);
    assert!(storage.read_count(&c.path) > 0);

    assert_eq!(results.len(), 3);
    assert_eq!(results[&a.path], cached_a);
    assert_eq!(results[&b.path], cached_b);
    assert!(results[&c.path].is_empty());
  }

  #[tokio::test]
  async fn test_process_batch_omits_failed_files() {
    let storage = vault();
    let coordinator = coordinator(&storage, false);

    let good = stat(&storage, "Inbox.md").await;
    let missing = FileStat::new("Gone.md", 5, 0);

    let results = coordinator.process_batch(&[good.clone(), missing]).await;
    assert_eq!(results.len(), 1);
    assert!(results.contains_key(&good.path));

    // The failed file leaves only an orphaned record, which the sweep removes
    assert!(!coordinator.file_index().has_valid_cache("Gone.md", 5));
    assert_eq!(coordinator.file_index().validate_cache_consistency(), 1);
  }

  #[tokio::test]
  async fn test_mtime_optimization_disabled_always_reparses() {
    let storage = vault();
    let mut config = test_config(false);
    config.index.mtime_optimization = false;
    let coordinator = ComputeCoordinator::with_storage(storage.clone(), config);
    let file = stat(&storage, "Inbox.md").await;

    coordinator.process_file(&file).await.unwrap();
    let reads = storage.read_count("Inbox.md");
    coordinator.process_file(&file).await.unwrap();

    assert!(storage.read_count("Inbox.md") > reads);
    assert_eq!(coordinator.get_stats().files_skipped, 0);
    assert!(coordinator.file_index().has_valid_cache("Inbox.md", file.mtime));
  }

  #[tokio::test]
  async fn test_modified_file_is_reparsed() {
    let storage = vault();
    let coordinator = coordinator(&storage, false);
    let file = stat(&storage, "Inbox.md").await;
    coordinator.process_file(&file).await.unwrap();

    storage.modify("Inbox.md", "---\nproject: Home\n---\n- [ ] buy milk\n- [ ] call mom\n");
    let file = stat(&storage, "Inbox.md").await;
    let tasks = coordinator.process_file(&file).await.unwrap();

    assert_eq!(tasks.len(), 2);
    assert!(coordinator.file_index().has_valid_cache("Inbox.md", file.mtime));
    assert!(!coordinator.file_index().has_valid_cache("Inbox.md", file.mtime - 1));
  }

  // ==========================================================================
  // Project data
  // ==========================================================================

  #[tokio::test]
  async fn test_get_project_data() {
    let storage = vault();
    let coordinator = coordinator(&storage, true);

    let data = coordinator.get_project_data("Inbox.md").await.unwrap();
    let project = data.tg_project.unwrap();
    assert_eq!((project.kind, project.name.as_str()), (AttributionKind::Metadata, "Home"));

    let data = coordinator.get_project_data("Projects/Alpha/todo.md").await.unwrap();
    assert_eq!(data.enhanced_metadata.get("owner"), Some(&json!("sam")));
    assert_eq!(data.enhanced_metadata.get("status"), Some(&json!("active")));

    // Second call is served from the resolver cache
    let again = coordinator.get_project_data("Projects/Alpha/todo.md").await.unwrap();
    assert!(Arc::ptr_eq(&data.enhanced_metadata, &again.enhanced_metadata));
    assert_eq!(data.timestamp, again.timestamp);
  }

  #[tokio::test]
  async fn test_get_batch_project_data() {
    let storage = vault();
    let coordinator = coordinator(&storage, true);
    let paths: Vec<String> = ["Inbox.md", "Projects/Alpha/todo.md", "Projects/Alpha/notes.md"]
      .into_iter()
      .map(String::from)
      .collect();

    coordinator.get_project_data("Inbox.md").await.unwrap();
    let results = coordinator.get_batch_project_data(&paths).await;

    assert_eq!(results.len(), 3);
    let names: Vec<(&str, &str)> = paths
      .iter()
      .map(|p| {
        let name = results[p].tg_project.as_ref().map(|a| a.name.as_str()).unwrap_or("");
        (p.as_str(), name)
      })
      .collect();
    assert_eq!(names, vec![
      ("Inbox.md", "Home"),
      ("Projects/Alpha/todo.md", "Alpha"),
      ("Projects/Alpha/notes.md", "Alpha"),
    ]);
    assert_eq!(coordinator.resolver().get_cache_stats().enhanced_metadata_cache.size, 3);
  }

  #[tokio::test]
  async fn test_enhanced_project_toggle() {
    let storage = vault();
    let coordinator = coordinator(&storage, false);
    assert!(coordinator.get_project_data("Inbox.md").await.unwrap().tg_project.is_some());

    coordinator.on_enhanced_project_setting_change(false);
    assert!(!coordinator.resolver().is_enhanced_project_enabled());
    let data = coordinator.get_project_data("Inbox.md").await.unwrap();
    assert!(data.tg_project.is_none());
    assert_eq!(data.enhanced_metadata.get("project"), Some(&json!("Home")));
  }

  #[tokio::test]
  async fn test_directory_cache_size_reported() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert("A/project.md", "project: A\n", 1);
    storage.insert("A/todo.md", "- [ ] a\n", 1);
    storage.insert("B/project.md", "project: B\n", 1);
    storage.insert("B/todo.md", "- [ ] b\n", 1);
    let coordinator = coordinator(&storage, false);

    for path in ["A/todo.md", "B/todo.md"] {
      let file = stat(&storage, path).await;
      coordinator.process_file(&file).await.unwrap();
    }

    let memory = coordinator.get_memory_stats();
    assert_eq!(memory.file_cache_size, 2);
    assert_eq!(memory.directory_cache_size, 2);
  }

  // ==========================================================================
  // Batch fan-out bound
  // ==========================================================================

  #[tokio::test]
  async fn test_process_batch_respects_concurrency_cap() {
    let (storage, coordinator, paths) = counting_coordinator();
    let mut files = Vec::new();
    for path in &paths {
      files.push(storage.inner.stat(path).await.unwrap());
    }

    let results = coordinator.process_batch(&files).await;

    assert_eq!(results.len(), 8);
    assert_eq!(storage.peak_reads(), 2);
  }

  #[tokio::test]
  async fn test_batch_project_data_respects_concurrency_cap() {
    let (storage, coordinator, paths) = counting_coordinator();

    let results = coordinator.get_batch_project_data(&paths).await;

    assert_eq!(results.len(), 8);
    assert_eq!(results["note-3.md"].enhanced_metadata.get("status"), Some(&json!("open")));
    assert_eq!(storage.peak_reads(), 2);
  }
}
