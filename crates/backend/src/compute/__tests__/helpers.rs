//! Test helpers for coordinator integration tests.
//!
//! Provides an in-memory vault, coordinator constructors for both dispatch
//! modes, `GatedStorage`, whose reads can be held open to observe in-flight
//! work, and `CountingStorage`, which records peak read concurrency.

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{
  compute::ComputeCoordinator,
  domain::{config::Config, project::Metadata},
  parse::MarkdownTaskParser,
  storage::{FileStat, FileStorage, MemoryStorage, MetadataSource, StorageError},
};

/// Config with a small fixed pool
pub fn test_config(workers: bool) -> Config {
  let mut config = Config::default();
  config.index.enable_workers = workers;
  config.index.worker_count = 2;
  config.index.batch_concurrency = 4;
  config
}

/// Three-document vault with a project config file
pub fn vault() -> Arc<MemoryStorage> {
  let storage = Arc::new(MemoryStorage::new());
  storage.insert("Projects/Alpha/project.md", "project: Alpha\nowner: sam\n", 1);
  storage.insert(
    "Projects/Alpha/todo.md",
    "---\nstatus: active\n---\n- [ ] draft plan #work\n- [x] kickoff ✅ 2024-04-01\n",
    1,
  );
  storage.insert("Projects/Alpha/notes.md", "Meeting notes, no tasks here.\n", 1);
  storage.insert("Inbox.md", "---\nproject: Home\n---\n- [ ] buy milk\n", 1);
  storage
}

pub fn coordinator(storage: &Arc<MemoryStorage>, workers: bool) -> ComputeCoordinator {
  ComputeCoordinator::with_storage(storage.clone(), test_config(workers))
}

/// Current stat for a stored file
pub async fn stat(storage: &MemoryStorage, path: &str) -> FileStat {
  storage.stat(path).await.expect("file should exist")
}

/// Metadata source with no front matter for any file
pub struct NoMetadata;

#[async_trait]
impl MetadataSource for NoMetadata {
  async fn file_metadata(&self, _path: &str) -> Option<Metadata> {
    None
  }
}

/// Storage whose content reads block while the gate is closed
pub struct GatedStorage {
  pub inner: MemoryStorage,
  closed: AtomicBool,
  entered: Notify,
  release: Notify,
}

impl GatedStorage {
  pub fn new(inner: MemoryStorage) -> Self {
    Self {
      inner,
      closed: AtomicBool::new(true),
      entered: Notify::new(),
      release: Notify::new(),
    }
  }

  /// Wait until a read is blocked on the gate
  pub async fn wait_for_read(&self) {
    self.entered.notified().await;
  }

  /// Let the blocked read (and all later reads) through
  pub fn open(&self) {
    self.closed.store(false, Ordering::SeqCst);
    self.release.notify_one();
  }
}

#[async_trait]
impl FileStorage for GatedStorage {
  async fn stat(&self, path: &str) -> Option<FileStat> {
    self.inner.stat(path).await
  }

  async fn read(&self, path: &str) -> Result<String, StorageError> {
    if self.closed.load(Ordering::SeqCst) {
      self.entered.notify_one();
      self.release.notified().await;
    }
    self.inner.read(path).await
  }

  async fn is_dir(&self, path: &str) -> bool {
    self.inner.is_dir(path).await
  }
}

/// Coordinator over a gated single-file vault
pub fn gated_coordinator(workers: bool) -> (Arc<GatedStorage>, Arc<ComputeCoordinator>) {
  let inner = MemoryStorage::new();
  inner.insert("slow.md", "- [ ] eventually\n", 1);
  let storage = Arc::new(GatedStorage::new(inner));
  let coordinator = ComputeCoordinator::new(
    storage.clone(),
    Arc::new(NoMetadata),
    Arc::new(MarkdownTaskParser::default()),
    test_config(workers),
  );
  (storage, Arc::new(coordinator))
}

/// Storage whose reads take a few milliseconds and record how many overlap
pub struct CountingStorage {
  pub inner: MemoryStorage,
  active: AtomicUsize,
  peak: AtomicUsize,
}

impl CountingStorage {
  pub fn new(inner: MemoryStorage) -> Self {
    Self {
      inner,
      active: AtomicUsize::new(0),
      peak: AtomicUsize::new(0),
    }
  }

  /// Most reads observed in progress at once
  pub fn peak_reads(&self) -> usize {
    self.peak.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl FileStorage for CountingStorage {
  async fn stat(&self, path: &str) -> Option<FileStat> {
    self.inner.stat(path).await
  }

  async fn read(&self, path: &str) -> Result<String, StorageError> {
    let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(10)).await;
    let result = self.inner.read(path).await;
    self.active.fetch_sub(1, Ordering::SeqCst);
    result
  }

  async fn is_dir(&self, path: &str) -> bool {
    self.inner.is_dir(path).await
  }
}

/// Inline coordinator over eight flat documents with `batch_concurrency = 2`
pub fn counting_coordinator() -> (Arc<CountingStorage>, ComputeCoordinator, Vec<String>) {
  let inner = MemoryStorage::new();
  let paths: Vec<String> = (0..8).map(|i| format!("note-{}.md", i)).collect();
  for path in &paths {
    inner.insert(path.clone(), "---\nstatus: open\n---\n- [ ] follow up\n", 1);
  }
  let storage = Arc::new(CountingStorage::new(inner));

  let mut config = test_config(false);
  config.index.batch_concurrency = 2;
  let coordinator = ComputeCoordinator::with_storage(storage.clone(), config);
  (storage, coordinator, paths)
}
