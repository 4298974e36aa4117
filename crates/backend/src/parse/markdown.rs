//! Checkbox-line task parser.
//!
//! Recognizes list items of the form `- [ ] text` (also `*`, `+`, and ordered
//! markers), `#tags`, dataview-style `[key:: value]` fields, and the common
//! emoji markers for dates, recurrence, ids and dependencies.

use chrono::NaiveDate;

use super::{ParseContext, TaskParser};
use crate::{
  domain::task::{Task, TaskMetadata},
  storage::{parse_value, split_front_matter, value_to_string},
};

const DUE: &str = "📅";
const START: &str = "🛫";
const SCHEDULED: &str = "⏳";
const DONE: &str = "✅";
const RECURRENCE: &str = "🔁";
const ID: &str = "🆔";
const DEPENDS: &str = "⛔";
const ON_COMPLETION: &str = "🏁";

const MARKERS: &[&str] = &[DUE, START, SCHEDULED, DONE, RECURRENCE, ID, DEPENDS, ON_COMPLETION];

/// Default [`TaskParser`]
#[derive(Debug, Clone)]
pub struct MarkdownTaskParser {
  /// Enhanced-metadata key a task inherits its project from
  project_key: String,
}

impl Default for MarkdownTaskParser {
  fn default() -> Self {
    Self {
      project_key: "project".to_string(),
    }
  }
}

impl MarkdownTaskParser {
  pub fn new(project_key: impl Into<String>) -> Self {
    Self {
      project_key: project_key.into(),
    }
  }
}

impl TaskParser for MarkdownTaskParser {
  fn parse(&self, path: &str, content: &str, context: &ParseContext) -> Vec<Task> {
    let (front, body) = split_front_matter(content);
    // Opening fence + block + closing fence
    let offset = front.map(|b| b.lines().count() + 2).unwrap_or(0);

    let inherited_project = context
      .enhanced_metadata
      .get(&self.project_key)
      .and_then(value_to_string);

    body
      .lines()
      .enumerate()
      .filter_map(|(idx, line)| {
        let (status, text) = parse_checkbox(line)?;
        let line_no = (offset + idx) as u32;
        let (content, mut metadata) = extract_metadata(text);

        if metadata.project.is_none() {
          metadata.project = inherited_project.clone();
        }
        metadata.tg_project = context.tg_project.clone();

        Some(Task {
          id: Task::make_id(path, line_no),
          content,
          file_path: path.to_string(),
          line: line_no,
          completed: matches!(status, 'x' | 'X'),
          status,
          original_markdown: line.to_string(),
          metadata,
        })
      })
      .collect()
  }
}

/// Split a list-item checkbox line into its status marker and text
fn parse_checkbox(line: &str) -> Option<(char, &str)> {
  let trimmed = line.trim_start();
  let rest = trimmed
    .strip_prefix("- ")
    .or_else(|| trimmed.strip_prefix("* "))
    .or_else(|| trimmed.strip_prefix("+ "))
    .or_else(|| strip_ordered_marker(trimmed))?;

  let rest = rest.strip_prefix('[')?;
  let mut chars = rest.chars();
  let status = chars.next()?;
  if matches!(status, '[' | ']') {
    return None;
  }
  let after = chars.as_str().strip_prefix(']')?;
  if !after.is_empty() && !after.starts_with(char::is_whitespace) {
    return None;
  }
  Some((status, after.trim()))
}

fn strip_ordered_marker(line: &str) -> Option<&str> {
  let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
  if digits == 0 {
    return None;
  }
  let rest = &line[digits..];
  rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") "))
}

/// Pull `[key:: value]` fields out of the text
fn take_inline_fields(text: &str) -> (String, Vec<(String, String)>) {
  let mut out = String::with_capacity(text.len());
  let mut fields = Vec::new();
  let mut rest = text;

  while let Some(start) = rest.find('[') {
    let after = &rest[start + 1..];
    let Some(end) = after.find(']') else {
      break;
    };
    let inner = &after[..end];
    if let Some((key, value)) = inner.split_once("::") {
      let key = key.trim();
      if !key.is_empty() && !key.contains(char::is_whitespace) {
        out.push_str(&rest[..start]);
        fields.push((key.to_string(), value.trim().to_string()));
        rest = &after[end + 1..];
        continue;
      }
    }
    out.push_str(&rest[..start + 1]);
    rest = after;
  }
  out.push_str(rest);

  (out, fields)
}

fn parse_date(value: &str) -> Option<NaiveDate> {
  NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

fn split_list(value: &str) -> Vec<String> {
  value
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(String::from)
    .collect()
}

fn is_tag(token: &str) -> bool {
  let mut chars = token.chars();
  chars.next() == Some('#') && chars.next().is_some_and(|c| c != '#')
}

fn apply_field(metadata: &mut TaskMetadata, key: &str, value: &str) {
  match key.to_ascii_lowercase().as_str() {
    "due" => metadata.due_date = parse_date(value),
    "start" => metadata.start_date = parse_date(value),
    "scheduled" => metadata.scheduled_date = parse_date(value),
    "completion" => metadata.completed_date = parse_date(value),
    "project" => metadata.project = (!value.is_empty()).then(|| value.to_string()),
    "id" => metadata.task_id = (!value.is_empty()).then(|| value.to_string()),
    "dependson" => metadata.depends_on = split_list(value),
    "oncompletion" => metadata.on_completion = (!value.is_empty()).then(|| value.to_string()),
    "repeat" | "recurrence" => metadata.recurrence = (!value.is_empty()).then(|| value.to_string()),
    _ => {
      metadata.extra.insert(key.to_string(), parse_value(value));
    }
  }
}

/// Extract task metadata and return the cleaned task text
fn extract_metadata(text: &str) -> (String, TaskMetadata) {
  let mut metadata = TaskMetadata::default();
  let (text, fields) = take_inline_fields(text);
  for (key, value) in &fields {
    apply_field(&mut metadata, key, value);
  }

  let mut words: Vec<&str> = Vec::new();
  let mut tokens = text.split_whitespace().peekable();

  while let Some(token) = tokens.next() {
    match token {
      DUE | START | SCHEDULED | DONE => {
        let date = tokens.next().and_then(parse_date);
        match token {
          DUE => metadata.due_date = date,
          START => metadata.start_date = date,
          SCHEDULED => metadata.scheduled_date = date,
          _ => metadata.completed_date = date,
        }
      }
      RECURRENCE => {
        let mut rule: Vec<&str> = Vec::new();
        while let Some(next) = tokens.peek() {
          if MARKERS.contains(next) || is_tag(next) {
            break;
          }
          rule.push(*next);
          tokens.next();
        }
        if !rule.is_empty() {
          metadata.recurrence = Some(rule.join(" "));
        }
      }
      ID => metadata.task_id = tokens.next().map(String::from),
      DEPENDS => metadata.depends_on = tokens.next().map(split_list).unwrap_or_default(),
      ON_COMPLETION => metadata.on_completion = tokens.next().map(String::from),
      t if is_tag(t) => {
        metadata.tags.push(t.to_string());
        words.push(t);
      }
      t => words.push(t),
    }
  }

  (words.join(" "), metadata)
}
