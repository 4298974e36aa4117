use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Key/value metadata attached to a file (front matter, config data, or the
/// merged "enhanced" view).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Which detection stage produced an attribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributionKind {
  Path,
  Metadata,
  Config,
  Default,
}

impl std::fmt::Display for AttributionKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      AttributionKind::Path => "path",
      AttributionKind::Metadata => "metadata",
      AttributionKind::Config => "config",
      AttributionKind::Default => "default",
    };
    write!(f, "{}", s)
  }
}

/// The project a document is attributed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectAttribution {
  #[serde(rename = "type")]
  pub kind: AttributionKind,
  pub name: String,
  /// Rule pattern, metadata key, or config file name that produced this
  pub source: String,
  /// Detection-derived attributions are never writable
  pub readonly: bool,
}

impl ProjectAttribution {
  pub fn new(kind: AttributionKind, name: impl Into<String>, source: impl Into<String>) -> Self {
    Self {
      kind,
      name: name.into(),
      source: source.into(),
      readonly: true,
    }
  }
}

/// Attribution plus merged metadata for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedProjectData {
  pub tg_project: Option<ProjectAttribution>,
  pub enhanced_metadata: Arc<Metadata>,
  /// When the data was computed (Unix timestamp in milliseconds)
  pub timestamp: i64,
}

impl CachedProjectData {
  pub fn new(tg_project: Option<ProjectAttribution>, enhanced_metadata: Arc<Metadata>) -> Self {
    Self {
      tg_project,
      enhanced_metadata,
      timestamp: chrono::Utc::now().timestamp_millis(),
    }
  }
}
