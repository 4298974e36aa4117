//! ComputeCoordinator - the engine's public face
//!
//! Decides per file whether cached tasks can be served or the file must be
//! re-read, dispatches the work (worker pool or inline), and keeps the
//! FileIndex and resolver caches coherent with file lifecycle events.
//!
//! # Stale results
//!
//! A computation registers its path in the in-flight table and captures the
//! path's epoch. Lifecycle hooks bump the epoch of in-flight paths; if a hook
//! fired for the same path in the meantime, the result is still returned to
//! the caller but is not written into the FileIndex. A path's row is removed
//! when its last computation finishes, so the table only holds paths that are
//! being computed.

use std::{
  collections::HashMap,
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::Instant,
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::{StreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{
  executor::{ComputeContext, Executor, InlineExecutor},
  message::{ComputeError, ComputeJob, ComputeOutput},
  stats::{MemoryStats, ProcessingStats, StatsCounters},
  worker::WorkerPool,
};
use crate::{
  domain::{
    config::{Config, IndexConfig, ProjectConfig},
    project::CachedProjectData,
    task::Task,
  },
  index::FileIndex,
  parse::{MarkdownTaskParser, ParseContext, TaskParser},
  project::ProjectResolver,
  storage::{FileStat, FileStorage, FrontMatterReader, FsStorage, MetadataSource},
};

pub struct ComputeCoordinator {
  ctx: Arc<ComputeContext>,
  file_index: FileIndex,
  inline: InlineExecutor,
  pool: Option<WorkerPool>,
  index_config: IndexConfig,
  workers_enabled: AtomicBool,
  /// Paths with computations in flight
  in_flight: DashMap<String, PathEpoch>,
  stats: StatsCounters,
  cancel: CancellationToken,
  destroyed: AtomicBool,
}

impl ComputeCoordinator {
  /// Create a coordinator over the given collaborators.
  ///
  /// The worker pool is started when a Tokio runtime is available; otherwise
  /// every job runs inline.
  pub fn new(
    storage: Arc<dyn FileStorage>,
    metadata_source: Arc<dyn MetadataSource>,
    parser: Arc<dyn TaskParser>,
    config: Config,
  ) -> Self {
    let Config { project, index } = config;
    let resolver = Arc::new(ProjectResolver::new(
      storage.clone(),
      metadata_source,
      project,
      index.max_cache_entries,
    ));
    let ctx = Arc::new(ComputeContext {
      storage,
      parser,
      resolver,
    });
    let cancel = CancellationToken::new();

    let pool = match tokio::runtime::Handle::try_current() {
      Ok(_) => Some(WorkerPool::spawn(index.workers(), ctx.clone(), cancel.child_token())),
      Err(_) => {
        warn!("No Tokio runtime, worker pool disabled");
        None
      }
    };
    let workers_enabled = index.enable_workers && pool.is_some();

    Self {
      inline: InlineExecutor::new(ctx.clone()),
      ctx,
      file_index: FileIndex::new(),
      pool,
      index_config: index,
      workers_enabled: AtomicBool::new(workers_enabled),
      in_flight: DashMap::new(),
      stats: StatsCounters::default(),
      cancel,
      destroyed: AtomicBool::new(false),
    }
  }

  /// Coordinator reading front matter and tasks straight from `storage`
  pub fn with_storage(storage: Arc<dyn FileStorage>, config: Config) -> Self {
    let reader = Arc::new(FrontMatterReader::new(storage.clone()));
    let parser = Arc::new(MarkdownTaskParser::new(config.project.metadata.metadata_key.clone()));
    Self::new(storage, reader, parser, config)
  }

  /// Coordinator over a vault directory, configured from its config files
  pub fn for_vault(root: &Path) -> Self {
    let config = Config::load_for_vault(root);
    Self::with_storage(Arc::new(FsStorage::new(root)), config)
  }

  pub fn file_index(&self) -> &FileIndex {
    &self.file_index
  }

  pub fn resolver(&self) -> &ProjectResolver {
    &self.ctx.resolver
  }

  fn ensure_live(&self) -> Result<(), ComputeError> {
    if self.destroyed.load(Ordering::SeqCst) {
      Err(ComputeError::Destroyed)
    } else {
      Ok(())
    }
  }

  /// A path with no computation in flight has nothing to mark stale
  fn bump_epoch(&self, path: &str) {
    if let Some(mut entry) = self.in_flight.get_mut(path) {
      entry.epoch += 1;
    }
  }

  /// Number of paths with computations in flight
  #[cfg(test)]
  pub(crate) fn in_flight_paths(&self) -> usize {
    self.in_flight.len()
  }

  // ========================================================================
  // Dispatch
  // ========================================================================

  async fn execute(&self, job: ComputeJob) -> Result<ComputeOutput, ComputeError> {
    self.ensure_live()?;

    if self.is_workers_enabled()
      && let Some(pool) = &self.pool
    {
      match pool.execute(job.clone()).await {
        Err(ComputeError::WorkerGone) => {
          warn!(path = %job.path(), "Worker pool unavailable, computing inline");
        }
        result => return result,
      }
    }

    let executor: &dyn Executor = &self.inline;
    tokio::select! {
      biased;
      _ = self.cancel.cancelled() => Err(ComputeError::Destroyed),
      result = executor.execute(job) => result,
    }
  }

  // ========================================================================
  // Project data
  // ========================================================================

  /// Attribution + enhanced metadata for `path`, cache first.
  ///
  /// Returns `None` after logging if the computation fails.
  pub async fn get_project_data(&self, path: &str) -> Option<CachedProjectData> {
    if let Some(data) = self.resolver().cached_project_data(path).await {
      trace!(path = %path, "Project data cache hit");
      return Some(data);
    }
    self.compute_project_data(path).await
  }

  async fn compute_project_data(&self, path: &str) -> Option<CachedProjectData> {
    let job = ComputeJob::ResolveProject { path: path.to_string() };
    match self.execute(job).await.and_then(ComputeOutput::into_project) {
      Ok(data) => Some(data),
      Err(e) => {
        warn!(path = %path, error = %e, "Failed to compute project data");
        None
      }
    }
  }

  /// Project data for many paths. Failed paths are omitted.
  pub async fn get_batch_project_data(&self, paths: &[String]) -> HashMap<String, CachedProjectData> {
    let mut results = HashMap::with_capacity(paths.len());
    let mut misses = Vec::new();

    for path in paths {
      match self.resolver().cached_project_data(path).await {
        Some(data) => {
          results.insert(path.clone(), data);
        }
        None => misses.push(path),
      }
    }
    debug!(hits = results.len(), misses = misses.len(), "Batch project data");

    let computed: Vec<(String, Option<CachedProjectData>)> = stream::iter(misses)
      .map(|path| async move { (path.clone(), self.compute_project_data(path).await) })
      .buffer_unordered(self.index_config.batch_concurrency.max(1))
      .collect()
      .await;

    results.extend(computed.into_iter().filter_map(|(path, data)| data.map(|d| (path, d))));
    results
  }

  // ========================================================================
  // Task processing
  // ========================================================================

  /// Tasks for one file, served from the FileIndex when its mtime matches
  #[tracing::instrument(level = "trace", skip(self, file), fields(path = %file.path))]
  pub async fn process_file(&self, file: &FileStat) -> Result<Arc<[Task]>, ComputeError> {
    self.ensure_live()?;
    let path = file.path.as_str();

    if self.index_config.mtime_optimization
      && let Some(tasks) = self.file_index.cached_tasks(path, file.mtime)
    {
      trace!(path = %path, "Skipping unchanged file");
      self.stats.record_skipped(tasks.len());
      return Ok(tasks);
    }

    let guard = InFlight::begin(&self.in_flight, path);
    self.file_index.update_file_mtime(path, file.mtime);

    let context = match self.get_project_data(path).await {
      Some(data) => ParseContext {
        tg_project: data.tg_project,
        enhanced_metadata: data.enhanced_metadata,
      },
      None => ParseContext::default(),
    };

    let job = ComputeJob::ParseFile {
      path: path.to_string(),
      context,
    };
    let tasks: Arc<[Task]> = self.execute(job).await?.into_tasks()?.into();

    let written = guard.commit(|| {
      self.file_index.update_index_with_tasks(path, tasks.clone(), file.mtime);
    });
    if !written {
      debug!(path = %path, "File changed during processing, result not cached");
    }
    drop(guard);

    self.stats.record_processed(tasks.len());
    Ok(tasks)
  }

  /// Process many files with bounded concurrency. Failed files are omitted.
  pub async fn process_batch(&self, files: &[FileStat]) -> HashMap<String, Arc<[Task]>> {
    let start = Instant::now();

    let results: Vec<(String, Result<Arc<[Task]>, ComputeError>)> = stream::iter(files)
      .map(|file| async move { (file.path.clone(), self.process_file(file).await) })
      .buffer_unordered(self.index_config.batch_concurrency.max(1))
      .collect()
      .await;

    let mut processed = HashMap::with_capacity(results.len());
    for (path, result) in results {
      match result {
        Ok(tasks) => {
          processed.insert(path, tasks);
        }
        Err(e) => warn!(path = %path, error = %e, "Failed to process file"),
      }
    }

    self.stats.record_batch(start.elapsed());
    debug!(files = files.len(), processed = processed.len(), "Batch processed");
    processed
  }

  pub fn get_stats(&self) -> ProcessingStats {
    self.stats.snapshot()
  }

  // ========================================================================
  // Lifecycle hooks
  // ========================================================================

  fn invalidate(&self, path: &str) {
    self.bump_epoch(path);
    self.file_index.cleanup_file_cache(path);

    let resolver = self.resolver();
    resolver.clear_cache(Some(path));
    if resolver.config().is_config_file(path) {
      debug!(path = %path, "Project config file changed");
      resolver.invalidate_config_file(path);
    }
  }

  pub fn on_file_created(&self, path: &str) {
    trace!(path = %path, "File created");
    self.invalidate(path);
  }

  /// Invalidate only; the next read recomputes
  pub fn on_file_modified(&self, path: &str) {
    trace!(path = %path, "File modified");
    self.invalidate(path);
  }

  pub fn on_file_renamed(&self, old_path: &str, new_path: &str) {
    trace!(from = %old_path, to = %new_path, "File renamed");
    self.invalidate(old_path);
    self.invalidate(new_path);
  }

  pub fn on_file_deleted(&self, path: &str) {
    trace!(path = %path, "File deleted");
    self.invalidate(path);
  }

  // ========================================================================
  // Settings
  // ========================================================================

  /// Toggle dispatch to the worker pool. Caches are kept.
  pub fn set_workers_enabled(&self, enabled: bool) {
    if enabled && self.pool.is_none() {
      warn!("Worker pool not running, jobs stay inline");
    }
    self.workers_enabled.store(enabled, Ordering::SeqCst);
    debug!(enabled, "Worker dispatch toggled");
  }

  pub fn is_workers_enabled(&self) -> bool {
    self.workers_enabled.load(Ordering::SeqCst)
  }

  /// Apply new detection settings; drops resolver caches, keeps the FileIndex
  pub fn on_settings_change(&self, config: ProjectConfig) {
    info!("Project detection settings changed");
    self.resolver().set_config(config);
  }

  pub fn on_enhanced_project_setting_change(&self, enabled: bool) {
    info!(enabled, "Enhanced project setting changed");
    self.resolver().set_enhanced_enabled(enabled);
  }

  pub fn get_memory_stats(&self) -> MemoryStats {
    MemoryStats {
      file_cache_size: self.file_index.len(),
      directory_cache_size: self.resolver().directory_cache_size(),
      pending_requests: self.pool.as_ref().map_or(0, WorkerPool::pending_requests),
      active_workers: self.pool.as_ref().map_or(0, WorkerPool::active_workers),
      workers_enabled: self.is_workers_enabled(),
    }
  }

  // ========================================================================
  // Shutdown
  // ========================================================================

  /// Stop workers, reject pending requests, and reset counters. Idempotent.
  pub async fn destroy(&self) {
    let first = !self.destroyed.swap(true, Ordering::SeqCst);
    self.cancel.cancel();
    if let Some(pool) = &self.pool {
      pool.shutdown().await;
    }
    self.stats.reset();
    if first {
      info!("Compute coordinator destroyed");
    }
  }

  pub fn is_destroyed(&self) -> bool {
    self.destroyed.load(Ordering::SeqCst)
  }
}

// ============================================================================
// In-flight tracking
// ============================================================================

#[derive(Debug, Default)]
struct PathEpoch {
  epoch: u64,
  computations: usize,
}

/// Registration of one computation for a path. Dropping it unregisters the
/// computation and removes the path's row once none remain.
struct InFlight<'a> {
  table: &'a DashMap<String, PathEpoch>,
  path: &'a str,
  epoch: u64,
}

impl<'a> InFlight<'a> {
  fn begin(table: &'a DashMap<String, PathEpoch>, path: &'a str) -> Self {
    let mut entry = table.entry(path.to_string()).or_default();
    entry.computations += 1;
    let epoch = entry.epoch;
    drop(entry);
    Self { table, path, epoch }
  }

  /// Run `write` if no lifecycle hook fired since `begin`. The row stays
  /// locked while `write` runs, so a concurrent hook waits for it.
  fn commit(&self, write: impl FnOnce()) -> bool {
    match self.table.get(self.path) {
      Some(entry) if entry.epoch == self.epoch => {
        write();
        true
      }
      _ => false,
    }
  }
}

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    if let Entry::Occupied(mut row) = self.table.entry(self.path.to_string()) {
      let entry = row.get_mut();
      entry.computations = entry.computations.saturating_sub(1);
      if entry.computations == 0 {
        row.remove();
      }
    }
  }
}
