use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::project::{Metadata, ProjectAttribution};

/// A task line extracted from a document.
///
/// Tasks are immutable once stored in the file index; a reparse replaces the
/// whole list for the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
  /// Stable within one parse: `<file_path>-L<line>`
  pub id: String,
  pub content: String,
  pub file_path: String,
  /// Zero-based line number within the file
  pub line: u32,
  pub completed: bool,
  /// Checkbox marker character (' ', 'x', '/', '-', ...)
  pub status: char,
  pub original_markdown: String,
  #[serde(default)]
  pub metadata: TaskMetadata,
}

impl Task {
  pub fn make_id(file_path: &str, line: u32) -> String {
    format!("{}-L{}", file_path, line)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
  #[serde(default)]
  pub tags: Vec<String>,

  /// Project named inline or inherited from the file's enhanced metadata
  #[serde(default)]
  pub project: Option<String>,

  /// Attribution resolved for the containing file
  #[serde(default)]
  pub tg_project: Option<ProjectAttribution>,

  #[serde(default)]
  pub due_date: Option<NaiveDate>,
  #[serde(default)]
  pub start_date: Option<NaiveDate>,
  #[serde(default)]
  pub scheduled_date: Option<NaiveDate>,
  #[serde(default)]
  pub completed_date: Option<NaiveDate>,

  /// Task ids this task depends on
  #[serde(default)]
  pub depends_on: Vec<String>,

  /// Explicit task id (`[id:: ...]`)
  #[serde(default)]
  pub task_id: Option<String>,

  /// Recurrence rule text (e.g. "every week")
  #[serde(default)]
  pub recurrence: Option<String>,

  /// Action to run when the task completes (e.g. "delete", "archive")
  #[serde(default)]
  pub on_completion: Option<String>,

  /// Inline fields without a dedicated slot
  #[serde(default)]
  pub extra: Metadata,
}
