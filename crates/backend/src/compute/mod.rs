//! Compute layer
//!
//! [`ComputeCoordinator`] is the single entry point callers use to get tasks
//! and project data for documents. Work is dispatched through an
//! [`Executor`]: the [`WorkerPool`] when workers are enabled, otherwise the
//! [`InlineExecutor`] on the caller's task. Both run the same
//! `ComputeJob::run`, so results are identical in either mode.
//!
//! # Worker protocol
//!
//! ```text
//! caller ──ComputeJob──▶ WorkerPool ──WorkerRequest{id}──▶ worker
//!   ▲                                                         │
//!   └─────── pending[id] ◀────── WorkerResponse{id} ◀─────────┘
//! ```
//!
//! - Each request carries a fresh UUID v7 id
//! - Responses with no pending entry are dropped
//! - `destroy()` rejects every pending request with [`ComputeError::Destroyed`]
//!
//! [`VaultWatcher`] turns filesystem events into the coordinator's lifecycle
//! hooks.

mod coordinator;
mod executor;
pub mod message;
mod stats;
mod watcher;
mod worker;

#[cfg(test)]
mod __tests__;

pub use coordinator::ComputeCoordinator;
pub use executor::{ComputeContext, Executor, InlineExecutor};
pub use message::{ComputeError, ComputeJob, ComputeOutput, RequestId, WorkerRequest, WorkerResponse};
pub use stats::{MemoryStats, ProcessingStats};
pub use watcher::{VaultWatcher, WatcherError};
pub use worker::{PendingTable, WorkerPool, complete};
