//! Worker pool tests: correlation, dispatch-mode equivalence, shutdown.

#[cfg(test)]
mod tests {
  use std::{sync::Arc, time::Duration};

  use pretty_assertions::assert_eq;
  use tokio::sync::oneshot;

  use crate::{
    compute::{
      ComputeError, ComputeOutput, PendingTable, WorkerResponse, __tests__::helpers::*, complete,
    },
    storage::FileStat,
  };

  // ==========================================================================
  // Correlation
  // ==========================================================================

  #[tokio::test]
  async fn test_response_without_pending_request_is_dropped() {
    let pending = PendingTable::new();
    let stray = WorkerResponse {
      id: "no-such-request".to_string(),
      result: Ok(ComputeOutput::Tasks(Vec::new())),
    };
    assert!(!complete(&pending, stray));
    assert!(pending.is_empty());
  }

  #[tokio::test]
  async fn test_response_resolves_matching_request_once() {
    let pending = PendingTable::new();
    let (tx, rx) = oneshot::channel();
    pending.insert("req-1".to_string(), tx);

    let response = |result| WorkerResponse {
      id: "req-1".to_string(),
      result,
    };
    assert!(complete(&pending, response(Ok(ComputeOutput::Tasks(Vec::new())))));
    // Duplicate answer for the same id
    assert!(!complete(&pending, response(Err(ComputeError::WorkerGone))));

    assert_eq!(rx.await.unwrap(), Ok(ComputeOutput::Tasks(Vec::new())));
  }

  // ==========================================================================
  // Dispatch modes
  // ==========================================================================

  #[tokio::test]
  async fn test_worker_and_inline_results_match() {
    let storage = vault();
    let pooled = coordinator(&storage, true);
    let inline = coordinator(&storage, false);
    assert!(pooled.is_workers_enabled());
    assert!(!inline.is_workers_enabled());

    for path in ["Projects/Alpha/todo.md", "Projects/Alpha/notes.md", "Inbox.md", "Projects/Alpha/project.md"] {
      let file = stat(&storage, path).await;
      let from_pool = pooled.process_file(&file).await.unwrap();
      let from_inline = inline.process_file(&file).await.unwrap();
      assert_eq!(from_pool, from_inline, "{path}");

      let pool_data = pooled.get_project_data(path).await.unwrap();
      let inline_data = inline.get_project_data(path).await.unwrap();
      assert_eq!(pool_data.tg_project, inline_data.tg_project);
      assert_eq!(pool_data.enhanced_metadata, inline_data.enhanced_metadata);
    }

    pooled.destroy().await;
    inline.destroy().await;
  }

  #[tokio::test]
  async fn test_toggling_workers_keeps_caches() {
    let storage = vault();
    let coordinator = coordinator(&storage, true);
    let file = stat(&storage, "Inbox.md").await;
    let cached = coordinator.process_file(&file).await.unwrap();

    coordinator.set_workers_enabled(false);
    assert!(!coordinator.is_workers_enabled());
    assert!(coordinator.file_index().has_valid_cache("Inbox.md", file.mtime));
    assert_eq!(coordinator.resolver().get_cache_stats().enhanced_metadata_cache.size, 1);

    let again = coordinator.process_file(&file).await.unwrap();
    assert!(Arc::ptr_eq(&cached, &again));

    coordinator.set_workers_enabled(true);
    assert!(coordinator.is_workers_enabled());
  }

  #[tokio::test]
  async fn test_memory_stats_report_pool() {
    let storage = vault();
    let coordinator = coordinator(&storage, true);

    let memory = coordinator.get_memory_stats();
    assert_eq!(memory.active_workers, 2);
    assert_eq!(memory.pending_requests, 0);
    assert!(memory.workers_enabled);

    coordinator.destroy().await;
    let memory = coordinator.get_memory_stats();
    assert_eq!(memory.active_workers, 0);
    assert_eq!(memory.pending_requests, 0);
  }

  // ==========================================================================
  // Shutdown
  // ==========================================================================

  #[tokio::test]
  async fn test_destroy_rejects_pending_worker_request() {
    let (storage, coordinator) = gated_coordinator(true);

    let worker = coordinator.clone();
    let in_flight = tokio::spawn(async move { worker.process_file(&FileStat::new("slow.md", 1, 0)).await });

    storage.wait_for_read().await;
    assert_eq!(coordinator.get_memory_stats().pending_requests, 1);

    coordinator.destroy().await;
    let result = tokio::time::timeout(Duration::from_secs(5), in_flight)
      .await
      .expect("pending request must settle")
      .unwrap();

    let err = result.unwrap_err();
    assert_eq!(err, ComputeError::Destroyed);
    assert!(err.to_string().contains("destroyed"));
    assert_eq!(coordinator.get_memory_stats().pending_requests, 0);
  }

  #[tokio::test]
  async fn test_destroy_rejects_inline_computation() {
    let (storage, coordinator) = gated_coordinator(false);

    let worker = coordinator.clone();
    let in_flight = tokio::spawn(async move { worker.process_file(&FileStat::new("slow.md", 1, 0)).await });

    storage.wait_for_read().await;
    coordinator.destroy().await;

    let result = tokio::time::timeout(Duration::from_secs(5), in_flight)
      .await
      .expect("inline computation must settle")
      .unwrap();
    assert_eq!(result.unwrap_err(), ComputeError::Destroyed);
  }

  #[tokio::test]
  async fn test_destroy_is_idempotent_and_resets_counters() {
    let storage = vault();
    let coordinator = coordinator(&storage, true);
    let file = stat(&storage, "Inbox.md").await;
    coordinator.process_file(&file).await.unwrap();
    coordinator.process_file(&file).await.unwrap();
    assert_eq!(coordinator.get_stats().files_skipped, 1);

    coordinator.destroy().await;
    coordinator.destroy().await;

    assert!(coordinator.is_destroyed());
    assert_eq!(coordinator.get_stats(), Default::default());
    assert_eq!(coordinator.process_file(&file).await.unwrap_err(), ComputeError::Destroyed);
    assert!(coordinator.get_project_data("Inbox.md").await.is_some(), "cache hits still served");
    assert!(coordinator.get_project_data("Missing.md").await.is_none());
    assert!(coordinator.process_batch(&[file]).await.is_empty());
  }
}
