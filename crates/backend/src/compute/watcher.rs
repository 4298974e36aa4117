//! VaultWatcher - drives the coordinator's lifecycle hooks from file events
//!
//! # Design
//!
//! Bridges notify's sync callbacks with the async coordinator:
//! 1. notify's callback uses `blocking_send` to forward events to a channel
//! 2. The async task records events per path in a [`ChangeTracker`]
//! 3. Changes are debounced and coalesced so bursts produce one hook call
//! 4. Settled changes invalidate cache rows via the coordinator hooks
//!
//! Only markdown documents are tracked. `.obsidian/`, `.trash/` and `.git/`
//! are always ignored, plus any rules in a `.tgindexignore` at the vault root.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::Arc,
  time::{Duration, Instant},
};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, event::RenameMode};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::coordinator::ComputeCoordinator;
use crate::storage::normalize;

const IGNORE_FILE: &str = ".tgindexignore";
const ALWAYS_IGNORED: &[&str] = &[".obsidian/", ".trash/", ".git/"];

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
  #[error("Failed to initialize watcher: {0}")]
  Init(#[source] notify::Error),

  #[error("Failed to watch path: {0}")]
  Watch(#[source] notify::Error),

  #[error("Failed to build ignore rules: {0}")]
  Ignore(#[source] ignore::Error),
}

// ============================================================================
// Change tracking
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChangeKind {
  Created,
  Modified,
  Deleted,
  Renamed { from: String },
}

#[derive(Debug)]
struct PendingChange {
  kind: ChangeKind,
  last_event: Instant,
}

impl PendingChange {
  fn new(kind: ChangeKind) -> Self {
    Self {
      kind,
      last_event: Instant::now(),
    }
  }

  fn update(&mut self, kind: ChangeKind) {
    self.last_event = Instant::now();

    match (&self.kind, &kind) {
      (ChangeKind::Created, ChangeKind::Modified) => {
        trace!("Coalescing create+modify -> create");
      }
      (ChangeKind::Deleted, ChangeKind::Created) => {
        self.kind = ChangeKind::Modified;
        trace!("Coalescing delete+create -> modified");
      }
      (ChangeKind::Created, ChangeKind::Deleted) => {
        self.kind = ChangeKind::Deleted;
        trace!("Coalescing create+delete -> delete");
      }
      (ChangeKind::Renamed { .. }, ChangeKind::Modified) => {
        trace!("Coalescing rename+modify -> rename");
      }
      _ => {
        self.kind = kind;
      }
    }
  }
}

/// Per-path pending changes, keyed by vault-relative path
struct ChangeTracker {
  root: PathBuf,
  ignore: Gitignore,
  pending: HashMap<String, PendingChange>,
}

impl ChangeTracker {
  fn new(root: PathBuf, ignore: Gitignore) -> Self {
    Self {
      root,
      ignore,
      pending: HashMap::new(),
    }
  }

  /// Vault-relative path for a tracked document, `None` if it is outside the
  /// vault, ignored, a directory, or not markdown
  fn tracked(&self, path: &Path) -> Option<String> {
    if path.is_dir() {
      return None;
    }
    let is_markdown = path
      .extension()
      .and_then(|ext| ext.to_str())
      .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
    if !is_markdown {
      return None;
    }
    let relative = path.strip_prefix(&self.root).ok()?;
    if self
      .ignore
      .matched_path_or_any_parents(relative, false)
      .is_ignore()
    {
      trace!(path = %path.display(), "Skipping ignored file");
      return None;
    }
    Some(normalize(&relative.to_string_lossy()))
  }

  fn push(&mut self, path: String, kind: ChangeKind) {
    match self.pending.get_mut(&path) {
      Some(existing) => existing.update(kind),
      None => {
        self.pending.insert(path, PendingChange::new(kind));
      }
    }
  }

  fn record(&mut self, event: &Event) {
    if let EventKind::Modify(notify::event::ModifyKind::Name(RenameMode::Both)) = event.kind
      && let [from, to, ..] = event.paths.as_slice()
    {
      let from = self.tracked(from);
      let to = self.tracked(to);
      match (from, to) {
        (Some(from), Some(to)) => {
          debug!(from = %from, to = %to, "File renamed");
          self.pending.remove(&from);
          self.push(to, ChangeKind::Renamed { from });
        }
        (Some(from), None) => self.push(from, ChangeKind::Deleted),
        (None, Some(to)) => self.push(to, ChangeKind::Created),
        (None, None) => {}
      }
      return;
    }

    let kind = match event.kind {
      EventKind::Create(_) => ChangeKind::Created,
      EventKind::Modify(notify::event::ModifyKind::Name(RenameMode::From)) => ChangeKind::Deleted,
      EventKind::Modify(notify::event::ModifyKind::Name(RenameMode::To)) => ChangeKind::Created,
      EventKind::Modify(_) => ChangeKind::Modified,
      EventKind::Remove(_) => ChangeKind::Deleted,
      EventKind::Access(_) | EventKind::Any | EventKind::Other => {
        trace!(kind = ?event.kind, "Ignoring event");
        return;
      }
    };

    for path in &event.paths {
      if let Some(relative) = self.tracked(path) {
        self.push(relative, kind.clone());
      }
    }
  }

  /// Remove and return changes quiet for at least `debounce`
  fn take_settled(&mut self, debounce: Duration) -> Vec<(String, ChangeKind)> {
    let now = Instant::now();
    let settled: Vec<String> = self
      .pending
      .iter()
      .filter(|(_, change)| now.duration_since(change.last_event) >= debounce)
      .map(|(path, _)| path.clone())
      .collect();

    settled
      .into_iter()
      .filter_map(|path| self.pending.remove(&path).map(|c| (path, c.kind)))
      .collect()
  }

  fn drain(&mut self) -> Vec<(String, ChangeKind)> {
    self.pending.drain().map(|(path, c)| (path, c.kind)).collect()
  }
}

fn apply_change(coordinator: &ComputeCoordinator, path: &str, kind: ChangeKind) {
  match kind {
    ChangeKind::Created => coordinator.on_file_created(path),
    ChangeKind::Modified => coordinator.on_file_modified(path),
    ChangeKind::Deleted => coordinator.on_file_deleted(path),
    ChangeKind::Renamed { from } => coordinator.on_file_renamed(&from, path),
  }
}

// ============================================================================
// VaultWatcher
// ============================================================================

/// Watches a vault directory and invalidates cache rows as files change
pub struct VaultWatcher {
  coordinator: Arc<ComputeCoordinator>,
  cancel: CancellationToken,
  debounce: Duration,
  // The notify watcher must be held to keep it alive
  _watcher: RecommendedWatcher,
  event_rx: mpsc::Receiver<Result<Event, notify::Error>>,
  tracker: ChangeTracker,
}

impl VaultWatcher {
  pub fn new(
    root: PathBuf,
    debounce: Duration,
    coordinator: Arc<ComputeCoordinator>,
    cancel: CancellationToken,
  ) -> Result<Self, WatcherError> {
    info!(root = %root.display(), "Initializing vault watcher");

    let ignore = build_ignore(&root)?;
    let (event_tx, event_rx) = mpsc::channel::<Result<Event, notify::Error>>(256);

    let mut watcher = RecommendedWatcher::new(
      move |res| {
        // Runs on notify's thread; drop the event if the channel is closed
        let _ = event_tx.blocking_send(res);
      },
      notify::Config::default(),
    )
    .map_err(WatcherError::Init)?;

    watcher
      .watch(&root, RecursiveMode::Recursive)
      .map_err(WatcherError::Watch)?;

    Ok(Self {
      coordinator,
      cancel,
      debounce,
      _watcher: watcher,
      event_rx,
      tracker: ChangeTracker::new(root, ignore),
    })
  }

  /// Spawn the watcher task
  pub fn spawn(
    root: PathBuf,
    debounce: Duration,
    coordinator: Arc<ComputeCoordinator>,
    cancel: CancellationToken,
  ) -> Result<tokio::task::JoinHandle<()>, WatcherError> {
    let task = Self::new(root, debounce, coordinator, cancel)?;
    Ok(tokio::spawn(task.run()))
  }

  /// Run until cancelled or the event channel closes
  pub async fn run(mut self) {
    let mut debounce_interval = tokio::time::interval(self.debounce);

    loop {
      tokio::select! {
        biased;

        _ = self.cancel.cancelled() => {
          info!("VaultWatcher shutting down (cancelled)");
          break;
        }

        event = self.event_rx.recv() => match event {
          Some(Ok(event)) => self.tracker.record(&event),
          Some(Err(e)) => warn!(error = %e, "Watcher error"),
          None => {
            info!("VaultWatcher shutting down (channel closed)");
            break;
          }
        },

        _ = debounce_interval.tick() => {
          let settled = self.tracker.take_settled(self.debounce);
          if !settled.is_empty() {
            debug!(count = settled.len(), "Flushing settled changes");
          }
          for (path, kind) in settled {
            apply_change(&self.coordinator, &path, kind);
          }
        }
      }
    }

    for (path, kind) in self.tracker.drain() {
      apply_change(&self.coordinator, &path, kind);
    }
  }
}

fn build_ignore(root: &Path) -> Result<Gitignore, WatcherError> {
  let mut builder = GitignoreBuilder::new(root);

  let ignore_path = root.join(IGNORE_FILE);
  if ignore_path.exists()
    && let Some(err) = builder.add(&ignore_path)
  {
    warn!(error = %err, "Error parsing {}, continuing with partial rules", IGNORE_FILE);
  }

  for pattern in ALWAYS_IGNORED {
    let _ = builder.add_line(None, pattern);
  }

  builder.build().map_err(WatcherError::Ignore)
}
