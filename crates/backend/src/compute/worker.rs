//! Fixed-size worker pool
//!
//! ```text
//! execute() ──WorkerRequest──▶ [shared queue] ──▶ worker × N
//!    ▲                                              │
//!    └── oneshot ◀── pending table ◀── collector ◀──┘ WorkerResponse
//! ```
//!
//! Callers park on a oneshot receiver registered under the request id. The
//! collector resolves it when the matching response arrives; responses with
//! no pending entry (stale, duplicate, or arriving after shutdown) are
//! dropped.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::{
  sync::{mpsc, oneshot},
  task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::{
  executor::{ComputeContext, Executor},
  message::{ComputeError, ComputeJob, ComputeOutput, RequestId, WorkerRequest, WorkerResponse},
};

/// Waiting callers keyed by request id
pub type PendingTable = DashMap<RequestId, oneshot::Sender<Result<ComputeOutput, ComputeError>>>;

const QUEUE_DEPTH_PER_WORKER: usize = 32;

pub struct WorkerPool {
  tx: mpsc::Sender<WorkerRequest>,
  pending: Arc<PendingTable>,
  workers: Mutex<Vec<JoinHandle<()>>>,
  collector: Mutex<Option<JoinHandle<()>>>,
  cancel: CancellationToken,
  size: usize,
}

impl WorkerPool {
  /// Start `size` workers. Must be called inside a Tokio runtime.
  pub fn spawn(size: usize, ctx: Arc<ComputeContext>, cancel: CancellationToken) -> Self {
    let size = size.max(1);
    let (tx, rx) = mpsc::channel::<WorkerRequest>(size * QUEUE_DEPTH_PER_WORKER);
    let (resp_tx, resp_rx) = mpsc::channel::<WorkerResponse>(size * QUEUE_DEPTH_PER_WORKER);
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    let pending = Arc::new(PendingTable::new());

    let workers = (0..size)
      .map(|worker_id| {
        tokio::spawn(compute_worker(
          worker_id,
          rx.clone(),
          resp_tx.clone(),
          ctx.clone(),
          cancel.clone(),
        ))
      })
      .collect();
    drop(resp_tx);

    let collector = tokio::spawn(response_collector(resp_rx, pending.clone(), cancel.clone()));

    info!(workers = size, "Worker pool started");

    Self {
      tx,
      pending,
      workers: Mutex::new(workers),
      collector: Mutex::new(Some(collector)),
      cancel,
      size,
    }
  }

  /// Dispatch a job and wait for its response
  pub async fn dispatch(&self, job: ComputeJob) -> Result<ComputeOutput, ComputeError> {
    if self.cancel.is_cancelled() {
      return Err(ComputeError::Destroyed);
    }

    let id: RequestId = Uuid::now_v7().to_string();
    let (reply_tx, reply_rx) = oneshot::channel();
    self.pending.insert(id.clone(), reply_tx);

    // Shutdown drains after cancelling; re-check so an entry inserted after
    // the drain is never left behind
    if self.cancel.is_cancelled() {
      self.pending.remove(&id);
      return Err(ComputeError::Destroyed);
    }

    trace!(request_id = %id, path = %job.path(), "Dispatching job");
    let request = WorkerRequest { id: id.clone(), job };
    let sent = tokio::select! {
      biased;
      _ = self.cancel.cancelled() => Err(ComputeError::Destroyed),
      res = self.tx.send(request) => res.map_err(|_| ComputeError::WorkerGone),
    };
    if let Err(e) = sent {
      self.pending.remove(&id);
      return Err(e);
    }

    // A dropped sender means the entry was discarded without an answer
    reply_rx.await.unwrap_or(Err(ComputeError::Destroyed))
  }

  /// Stop all workers and reject every pending request. Idempotent.
  pub async fn shutdown(&self) {
    self.cancel.cancel();

    let rejected = reject_pending(&self.pending);
    if rejected > 0 {
      debug!(rejected, "Rejected pending requests on shutdown");
    }

    let mut handles: Vec<JoinHandle<()>> = std::mem::take(&mut *lock(&self.workers));
    if let Some(collector) = lock(&self.collector).take() {
      handles.push(collector);
    }
    if handles.is_empty() {
      return;
    }

    for handle in handles {
      if let Err(e) = handle.await {
        warn!(error = %e, "Worker task failed during shutdown");
      }
    }
    info!(workers = self.size, "Worker pool stopped");
  }

  /// Requests dispatched but not yet answered
  pub fn pending_requests(&self) -> usize {
    self.pending.len()
  }

  /// Workers still running
  pub fn active_workers(&self) -> usize {
    lock(&self.workers).iter().filter(|h| !h.is_finished()).count()
  }

  /// Configured pool size
  pub fn size(&self) -> usize {
    self.size
  }
}

#[async_trait]
impl Executor for WorkerPool {
  async fn execute(&self, job: ComputeJob) -> Result<ComputeOutput, ComputeError> {
    self.dispatch(job).await
  }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Resolve the pending entry matching `response`.
///
/// Returns false (and drops the response) when no caller is waiting for it.
pub fn complete(pending: &PendingTable, response: WorkerResponse) -> bool {
  match pending.remove(&response.id) {
    Some((_, reply)) => {
      // The caller may have given up; nothing else to do
      let _ = reply.send(response.result);
      true
    }
    None => {
      trace!(request_id = %response.id, "Dropping response with no pending request");
      false
    }
  }
}

/// Fail every pending entry with [`ComputeError::Destroyed`]
fn reject_pending(pending: &PendingTable) -> usize {
  let ids: Vec<RequestId> = pending.iter().map(|e| e.key().clone()).collect();
  let mut rejected = 0;
  for id in ids {
    if let Some((_, reply)) = pending.remove(&id) {
      let _ = reply.send(Err(ComputeError::Destroyed));
      rejected += 1;
    }
  }
  rejected
}

/// Worker loop: pull a request from the shared queue, run it, report back.
///
/// A job still running when the pool is cancelled is abandoned.
async fn compute_worker(
  worker_id: usize,
  rx: Arc<tokio::sync::Mutex<mpsc::Receiver<WorkerRequest>>>,
  tx: mpsc::Sender<WorkerResponse>,
  ctx: Arc<ComputeContext>,
  cancel: CancellationToken,
) {
  trace!(worker_id, "Compute worker starting");
  let mut processed = 0;

  loop {
    let msg = {
      let mut rx_guard = rx.lock().await;
      tokio::select! {
        biased;
        _ = cancel.cancelled() => break,
        msg = rx_guard.recv() => msg,
      }
    };

    let Some(WorkerRequest { id, job }) = msg else {
      trace!(worker_id, "Compute worker: queue closed");
      break;
    };

    let result = tokio::select! {
      biased;
      _ = cancel.cancelled() => break,
      result = job.run(&ctx) => result,
    };

    if tx.send(WorkerResponse { id, result }).await.is_err() {
      trace!(worker_id, "Compute worker: collector closed");
      break;
    }
    processed += 1;
  }

  trace!(worker_id, processed, "Compute worker finished");
}

/// Routes worker responses to their waiting callers
async fn response_collector(
  mut rx: mpsc::Receiver<WorkerResponse>,
  pending: Arc<PendingTable>,
  cancel: CancellationToken,
) {
  loop {
    tokio::select! {
      biased;
      _ = cancel.cancelled() => break,
      response = rx.recv() => match response {
        Some(response) => {
          complete(&pending, response);
        }
        None => break,
      },
    }
  }
  trace!("Response collector finished");
}
