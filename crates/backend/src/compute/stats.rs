use std::{
  sync::atomic::{AtomicU64, Ordering},
  time::Duration,
};

use serde::Serialize;

/// Counters accumulated by `process_file` / `process_batch`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingStats {
  pub files_processed: u64,
  pub files_skipped: u64,
  pub tasks_found: u64,
  pub total_duration_ms: u64,
  pub batches: u64,
}

/// Snapshot of cache sizes and worker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
  pub file_cache_size: usize,
  pub directory_cache_size: usize,
  pub pending_requests: usize,
  pub active_workers: usize,
  pub workers_enabled: bool,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
  files_processed: AtomicU64,
  files_skipped: AtomicU64,
  tasks_found: AtomicU64,
  total_duration_ms: AtomicU64,
  batches: AtomicU64,
}

impl StatsCounters {
  pub fn record_processed(&self, tasks: usize) {
    self.files_processed.fetch_add(1, Ordering::Relaxed);
    self.tasks_found.fetch_add(tasks as u64, Ordering::Relaxed);
  }

  pub fn record_skipped(&self, tasks: usize) {
    self.files_skipped.fetch_add(1, Ordering::Relaxed);
    self.tasks_found.fetch_add(tasks as u64, Ordering::Relaxed);
  }

  pub fn record_batch(&self, elapsed: Duration) {
    self.batches.fetch_add(1, Ordering::Relaxed);
    self
      .total_duration_ms
      .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
  }

  pub fn snapshot(&self) -> ProcessingStats {
    ProcessingStats {
      files_processed: self.files_processed.load(Ordering::Relaxed),
      files_skipped: self.files_skipped.load(Ordering::Relaxed),
      tasks_found: self.tasks_found.load(Ordering::Relaxed),
      total_duration_ms: self.total_duration_ms.load(Ordering::Relaxed),
      batches: self.batches.load(Ordering::Relaxed),
    }
  }

  pub fn reset(&self) {
    for counter in [
      &self.files_processed,
      &self.files_skipped,
      &self.tasks_found,
      &self.total_duration_ms,
      &self.batches,
    ] {
      counter.store(0, Ordering::Relaxed);
    }
  }
}
