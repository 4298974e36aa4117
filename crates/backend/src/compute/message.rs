//! Compute message types
//!
//! Every unit of work is a [`ComputeJob`]. The worker pool wraps jobs in a
//! [`WorkerRequest`] tagged with a fresh [`RequestId`]; workers answer with a
//! [`WorkerResponse`] carrying the same id, which the pool matches back to
//! the waiting caller.

use crate::{
  domain::{project::CachedProjectData, task::Task},
  parse::ParseContext,
  storage::StorageError,
};

/// Unique identifier for a dispatched job (UUID v7, time ordered)
pub type RequestId = String;

/// A unit of work that can run on a worker or inline
#[derive(Debug, Clone)]
pub enum ComputeJob {
  /// Read and parse one document
  ParseFile { path: String, context: ParseContext },
  /// Resolve attribution and enhanced metadata for one document
  ResolveProject { path: String },
}

impl ComputeJob {
  pub fn path(&self) -> &str {
    match self {
      Self::ParseFile { path, .. } | Self::ResolveProject { path } => path,
    }
  }
}

/// Result of a [`ComputeJob`]
#[derive(Debug, Clone, PartialEq)]
pub enum ComputeOutput {
  Tasks(Vec<Task>),
  Project(CachedProjectData),
}

impl ComputeOutput {
  pub fn into_tasks(self) -> Result<Vec<Task>, ComputeError> {
    match self {
      Self::Tasks(tasks) => Ok(tasks),
      Self::Project(_) => Err(ComputeError::UnexpectedOutput("tasks")),
    }
  }

  pub fn into_project(self) -> Result<CachedProjectData, ComputeError> {
    match self {
      Self::Project(data) => Ok(data),
      Self::Tasks(_) => Err(ComputeError::UnexpectedOutput("project data")),
    }
  }
}

/// A job sent to the worker pool
#[derive(Debug)]
pub struct WorkerRequest {
  pub id: RequestId,
  pub job: ComputeJob,
}

/// A worker's answer to one [`WorkerRequest`]
#[derive(Debug)]
pub struct WorkerResponse {
  pub id: RequestId,
  pub result: Result<ComputeOutput, ComputeError>,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced by the compute layer
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComputeError {
  /// The coordinator was destroyed while the request was pending
  #[error("Compute manager destroyed")]
  Destroyed,
  /// The worker pool is not accepting work
  #[error("Worker pool unavailable")]
  WorkerGone,
  #[error("Storage error: {0}")]
  Storage(String),
  /// A worker task panicked or was aborted
  #[error("Worker task failed: {0}")]
  Join(String),
  #[error("Job produced unexpected output, expected {0}")]
  UnexpectedOutput(&'static str),
}

impl From<StorageError> for ComputeError {
  fn from(e: StorageError) -> Self {
    Self::Storage(e.to_string())
  }
}
