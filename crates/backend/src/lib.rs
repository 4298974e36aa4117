pub mod compute;
pub mod domain;
pub mod index;
pub mod parse;
pub mod project;
pub mod storage;

pub use compute::{ComputeCoordinator, ComputeError, MemoryStats, ProcessingStats, VaultWatcher};
pub use domain::{
  config::{self, Config},
  project::{CachedProjectData, Metadata, ProjectAttribution},
  task::Task,
};
pub use index::FileIndex;
pub use project::ProjectResolver;
