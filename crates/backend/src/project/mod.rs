//! Project attribution
//!
//! [`ProjectResolver`] assigns each document to a project through a fixed
//! chain of detection stages and keeps the resulting metadata in bounded,
//! mtime-validated caches.

mod cache;
mod detect;
mod resolver;

pub use cache::{CacheSize, CacheStats, MemoryUsage};
pub use resolver::ProjectResolver;
