//! Lifecycle hook tests: invalidation on create/modify/rename/delete,
//! settings changes, and results that race a hook.

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use crate::{
    compute::__tests__::helpers::*,
    domain::{
      config::{PathMapping, ProjectConfig},
      project::AttributionKind,
    },
    storage::FileStat,
  };

  #[tokio::test]
  async fn test_delete_drops_all_rows() {
    let storage = vault();
    let coordinator = coordinator(&storage, false);
    let file = stat(&storage, "Inbox.md").await;
    coordinator.process_file(&file).await.unwrap();

    storage.remove("Inbox.md");
    coordinator.on_file_deleted("Inbox.md");

    assert_eq!(coordinator.file_index().get_file_last_mtime("Inbox.md"), None);
    let stats = coordinator.resolver().get_cache_stats();
    assert_eq!(stats.file_metadata_cache.size, 0);
    assert_eq!(stats.enhanced_metadata_cache.size, 0);
  }

  #[tokio::test]
  async fn test_rename_drops_old_path() {
    let storage = vault();
    let coordinator = coordinator(&storage, false);
    let file = stat(&storage, "Inbox.md").await;
    coordinator.process_file(&file).await.unwrap();

    storage.rename("Inbox.md", "Archive/Inbox.md");
    coordinator.on_file_renamed("Inbox.md", "Archive/Inbox.md");
    assert_eq!(coordinator.file_index().get_file_last_mtime("Inbox.md"), None);
    assert!(coordinator.resolver().cached_project_data("Archive/Inbox.md").await.is_none());

    let moved = stat(&storage, "Archive/Inbox.md").await;
    let tasks = coordinator.process_file(&moved).await.unwrap();
    assert_eq!(tasks[0].file_path, "Archive/Inbox.md");
    assert_eq!(tasks[0].id, "Archive/Inbox.md-L3");
  }

  #[tokio::test]
  async fn test_modify_invalidates_without_recomputing() {
    let storage = vault();
    let coordinator = coordinator(&storage, false);
    let file = stat(&storage, "Inbox.md").await;
    coordinator.process_file(&file).await.unwrap();
    let reads = storage.total_reads();

    storage.modify("Inbox.md", "- [ ] changed\n");
    coordinator.on_file_modified("Inbox.md");

    assert_eq!(storage.total_reads(), reads);
    assert!(coordinator.file_index().is_empty());
    assert_eq!(coordinator.resolver().get_cache_stats().enhanced_metadata_cache.size, 0);

    let file = stat(&storage, "Inbox.md").await;
    let tasks = coordinator.process_file(&file).await.unwrap();
    assert_eq!(tasks[0].content, "changed");
  }

  #[tokio::test]
  async fn test_created_hook_clears_leftover_rows() {
    let storage = vault();
    let coordinator = coordinator(&storage, false);
    coordinator.get_project_data("Inbox.md").await.unwrap();

    coordinator.on_file_created("Inbox.md");
    assert!(coordinator.resolver().cached_project_data("Inbox.md").await.is_none());
  }

  #[tokio::test]
  async fn test_config_file_change_invalidates_inherited_rows() {
    let storage = vault();
    let coordinator = coordinator(&storage, false);
    let todo = stat(&storage, "Projects/Alpha/todo.md").await;
    coordinator.process_file(&todo).await.unwrap();
    coordinator.get_project_data("Inbox.md").await.unwrap();
    assert_eq!(coordinator.get_memory_stats().directory_cache_size, 1);

    storage.modify("Projects/Alpha/project.md", "project: Beta\n");
    coordinator.on_file_modified("Projects/Alpha/project.md");

    assert_eq!(coordinator.get_memory_stats().directory_cache_size, 0);
    assert_eq!(coordinator.resolver().get_cache_stats().enhanced_metadata_cache.size, 0);
    // Task rows of other files are untouched
    assert!(coordinator.file_index().has_valid_cache("Projects/Alpha/todo.md", todo.mtime));

    let data = coordinator.get_project_data("Projects/Alpha/todo.md").await.unwrap();
    assert_eq!(data.tg_project.unwrap().name, "Beta");
  }

  #[tokio::test]
  async fn test_settings_change_clears_resolver_only() {
    let storage = vault();
    let coordinator = coordinator(&storage, false);
    let file = stat(&storage, "Inbox.md").await;
    coordinator.process_file(&file).await.unwrap();

    let config = ProjectConfig {
      path_mappings: vec![PathMapping::new("Inbox", "Triage")],
      ..Default::default()
    };
    coordinator.on_settings_change(config);

    let stats = coordinator.resolver().get_cache_stats();
    assert_eq!(stats.file_metadata_cache.size, 0);
    assert_eq!(stats.enhanced_metadata_cache.size, 0);
    assert!(coordinator.file_index().has_valid_cache("Inbox.md", file.mtime));

    let project = coordinator.get_project_data("Inbox.md").await.unwrap().tg_project.unwrap();
    assert_eq!((project.kind, project.name.as_str()), (AttributionKind::Path, "Triage"));
  }

  #[tokio::test]
  async fn test_stale_entries_cleared_after_external_delete() {
    let storage = vault();
    let coordinator = coordinator(&storage, false);
    let paths: Vec<String> = vec!["Inbox.md".into(), "Projects/Alpha/notes.md".into()];
    coordinator.get_batch_project_data(&paths).await;

    // Removed without a lifecycle event
    storage.remove("Inbox.md");
    assert_eq!(coordinator.resolver().clear_stale_entries().await, 1);
    assert!(coordinator.resolver().cached_project_data("Projects/Alpha/notes.md").await.is_some());
  }

  #[tokio::test]
  async fn test_result_racing_a_hook_is_not_cached() {
    let (storage, coordinator) = gated_coordinator(true);
    let file = FileStat::new("slow.md", 1, 0);

    let worker = coordinator.clone();
    let pending_file = file.clone();
    let in_flight = tokio::spawn(async move { worker.process_file(&pending_file).await });

    storage.wait_for_read().await;
    coordinator.on_file_modified("slow.md");
    storage.open();

    let tasks = in_flight.await.unwrap().unwrap();
    assert_eq!(tasks.len(), 1, "caller still gets its result");
    assert!(!coordinator.file_index().has_valid_cache("slow.md", 1));

    assert_eq!(coordinator.in_flight_paths(), 0);

    // The next call computes and caches normally
    coordinator.process_file(&file).await.unwrap();
    assert!(coordinator.file_index().has_valid_cache("slow.md", 1));
    coordinator.destroy().await;
  }

  #[tokio::test]
  async fn test_hook_churn_leaves_no_tracking_rows() {
    let storage = vault();
    let coordinator = coordinator(&storage, false);

    for i in 0..1_000 {
      let path = format!("Churn/note-{}.md", i);
      let renamed = format!("Churn/renamed-{}.md", i);
      coordinator.on_file_created(&path);
      coordinator.on_file_renamed(&path, &renamed);
      coordinator.on_file_deleted(&renamed);
    }
    assert_eq!(coordinator.in_flight_paths(), 0);

    let files = vec![stat(&storage, "Inbox.md").await, stat(&storage, "Projects/Alpha/todo.md").await];
    coordinator.process_batch(&files).await;
    coordinator.on_file_modified("Inbox.md");

    assert_eq!(coordinator.in_flight_paths(), 0);
    assert_eq!(coordinator.file_index().len(), 1);
  }
}
