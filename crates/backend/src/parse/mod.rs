//! Task extraction seam.
//!
//! The engine treats the markdown grammar as a collaborator: anything that
//! implements [`TaskParser`] can be plugged into the coordinator. Workers and
//! the inline path call the same parser, so both produce identical task lists.

mod markdown;

use std::sync::Arc;

pub use self::markdown::MarkdownTaskParser;
use crate::domain::{
  project::{Metadata, ProjectAttribution},
  task::Task,
};

/// Per-file inputs resolved before parsing
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
  pub tg_project: Option<ProjectAttribution>,
  pub enhanced_metadata: Arc<Metadata>,
}

/// Turns document text into task records
pub trait TaskParser: Send + Sync + 'static {
  fn parse(&self, path: &str, content: &str, context: &ParseContext) -> Vec<Task>;
}
