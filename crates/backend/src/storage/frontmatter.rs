//! Front matter and project config document readers.
//!
//! Front-matter blocks are YAML and go through `serde_yaml`. Config document
//! bodies are plain `key: value` lines, read by [`parse_key_values`], which
//! also understands inline `[a, b]` lists and `- item` lists under an empty key.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{trace, warn};

use super::{FileStorage, MetadataSource};
use crate::domain::project::Metadata;

/// Split a document into its front-matter block (without fences) and body.
pub fn split_front_matter(content: &str) -> (Option<&str>, &str) {
  let content = content.strip_prefix('\u{feff}').unwrap_or(content);
  let Some(rest) = content
    .strip_prefix("---\n")
    .or_else(|| content.strip_prefix("---\r\n"))
  else {
    return (None, content);
  };

  let mut offset = 0;
  for line in rest.split_inclusive('\n') {
    if line.trim_end() == "---" {
      let block = &rest[..offset];
      let body = &rest[offset + line.len()..];
      return (Some(block), body);
    }
    offset += line.len();
  }

  // Unterminated fence: not front matter
  (None, content)
}

/// Parse a YAML front-matter block into a metadata map.
///
/// An empty block or a document that is not a mapping yields an empty map.
pub fn parse_front_matter(block: &str) -> Result<Metadata, serde_yaml::Error> {
  if block.trim().is_empty() {
    return Ok(Metadata::new());
  }
  match serde_yaml::from_str::<Value>(block)? {
    Value::Object(map) => Ok(map),
    other => {
      trace!(value = %other, "Front matter is not a mapping");
      Ok(Metadata::new())
    }
  }
}

/// Parse flat `key: value` lines into a metadata map.
///
/// Earlier keys win over later duplicates.
pub fn parse_key_values(text: &str) -> Metadata {
  let mut map = Metadata::new();
  let mut list_key: Option<String> = None;

  for raw in text.lines() {
    let line = raw.trim_end();
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
      continue;
    }

    if let Some(key) = &list_key
      && let Some(item) = trimmed.strip_prefix("- ")
    {
      let slot = map.entry(key.clone()).or_insert(Value::Null);
      match slot {
        Value::Array(items) => items.push(parse_value(item)),
        _ => *slot = Value::Array(vec![parse_value(item)]),
      }
      continue;
    }
    list_key = None;

    // Only top-level keys
    if line.starts_with(char::is_whitespace) {
      continue;
    }

    let Some((key, value)) = line.split_once(':') else {
      continue;
    };
    let key = key.trim();
    if !is_key(key) || map.contains_key(key) {
      continue;
    }

    let value = value.trim();
    if value.is_empty() {
      map.insert(key.to_string(), Value::Null);
      list_key = Some(key.to_string());
    } else {
      map.insert(key.to_string(), parse_value(value));
    }
  }

  map
}

fn is_key(key: &str) -> bool {
  !key.is_empty()
    && !key.starts_with('-')
    && key
      .chars()
      .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ' '))
}

/// Parse a scalar or inline-list value.
pub fn parse_value(raw: &str) -> Value {
  let raw = raw.trim();

  if raw.len() >= 2
    && ((raw.starts_with('"') && raw.ends_with('"')) || (raw.starts_with('\'') && raw.ends_with('\'')))
  {
    return Value::String(raw[1..raw.len() - 1].to_string());
  }

  // Wiki links look like nested lists; keep them verbatim
  if raw.starts_with("[[") && raw.ends_with("]]") {
    return Value::String(raw.to_string());
  }

  if let Some(inner) = raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
    let items = inner
      .split(',')
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(parse_value)
      .collect();
    return Value::Array(items);
  }

  match raw {
    "true" => return Value::Bool(true),
    "false" => return Value::Bool(false),
    _ => {}
  }

  if let Ok(n) = raw.parse::<i64>() {
    return Value::from(n);
  }
  if let Ok(f) = raw.parse::<f64>()
    && let Some(n) = serde_json::Number::from_f64(f)
  {
    return Value::Number(n);
  }

  Value::String(raw.to_string())
}

/// Render a metadata value as a non-empty string, if it has one.
///
/// Lists yield their first non-empty element.
pub fn value_to_string(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => {
      let s = s.trim();
      (!s.is_empty()).then(|| s.to_string())
    }
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    Value::Array(items) => items.iter().find_map(value_to_string),
    Value::Null | Value::Object(_) => None,
  }
}

// ============================================================================
// FrontMatterReader
// ============================================================================

/// [`MetadataSource`] that reads front matter straight from storage.
pub struct FrontMatterReader {
  storage: Arc<dyn FileStorage>,
}

impl FrontMatterReader {
  pub fn new(storage: Arc<dyn FileStorage>) -> Self {
    Self { storage }
  }
}

#[async_trait]
impl MetadataSource for FrontMatterReader {
  async fn file_metadata(&self, path: &str) -> Option<Metadata> {
    let content = match self.storage.read(path).await {
      Ok(c) => c,
      Err(e) => {
        trace!(path = %path, error = %e, "No front matter: read failed");
        return None;
      }
    };
    let (block, _) = split_front_matter(&content);
    match parse_front_matter(block?) {
      Ok(metadata) => Some(metadata),
      Err(e) => {
        warn!(path = %path, error = %e, "Invalid front matter");
        None
      }
    }
  }
}
