// Detection stages that need no I/O
//
// The resolver feeds these with already-loaded metadata; the config-file stage
// lives in the resolver because it walks storage.

use std::sync::Arc;

use tracing::debug;

use crate::{
  domain::{
    config::{DefaultNamingConfig, MetadataMapping, NamingStrategy, PathMapping},
    project::{AttributionKind, Metadata, ProjectAttribution},
  },
  storage::{
    file_name, normalize, parent_dir, parse_front_matter, parse_key_values, split_front_matter, value_to_string,
  },
};

/// First enabled rule whose pattern occurs in `path`
pub fn match_path(path: &str, mappings: &[PathMapping]) -> Option<ProjectAttribution> {
  let path = normalize(path);
  mappings
    .iter()
    .filter(|m| m.enabled && !m.pattern.is_empty())
    .find(|m| path.contains(&normalize(&m.pattern)))
    .map(|m| ProjectAttribution::new(AttributionKind::Path, m.project_name.clone(), m.pattern.clone()))
}

/// Project named by `key` in the file's own metadata
pub fn match_metadata(metadata: &Metadata, key: &str) -> Option<ProjectAttribution> {
  let name = metadata.get(key).and_then(value_to_string)?;
  Some(ProjectAttribution::new(AttributionKind::Metadata, name, key))
}

/// Project named by `key` in a parsed config document
pub fn match_config(data: &Metadata, key: &str, config_file_name: &str) -> Option<ProjectAttribution> {
  let name = data.get(key).and_then(value_to_string)?;
  Some(ProjectAttribution::new(AttributionKind::Config, name, config_file_name))
}

/// Name derived from the path itself (or a metadata key) as a last resort
pub fn default_name(path: &str, metadata: &Metadata, naming: &DefaultNamingConfig) -> Option<ProjectAttribution> {
  let name = match naming.strategy {
    NamingStrategy::Filename => {
      let name = file_name(path);
      let name = if naming.strip_extension {
        match name.rfind('.') {
          Some(idx) if idx > 0 => &name[..idx],
          _ => name,
        }
      } else {
        name
      };
      Some(name.to_string())
    }
    NamingStrategy::Foldername => parent_dir(path).map(file_name).map(String::from),
    NamingStrategy::Metadata => metadata.get(&naming.metadata_key).and_then(value_to_string),
  }
  .filter(|n| !n.trim().is_empty())?;

  Some(ProjectAttribution::new(AttributionKind::Default, name, "default"))
}

/// Parse a project config document.
///
/// Front matter wins over `key: value` lines in the body.
pub fn parse_config_document(content: &str) -> Metadata {
  let (front, body) = split_front_matter(content);
  let mut data = match front.map(parse_front_matter) {
    Some(Ok(data)) => data,
    Some(Err(e)) => {
      debug!(error = %e, "Invalid front matter in project config, using body only");
      Metadata::new()
    }
    None => Metadata::new(),
  };
  for (key, value) in parse_key_values(body) {
    data.entry(key).or_insert(value);
  }
  data
}

/// Build the enhanced view: inherited config data, overlaid by the file's own
/// metadata, then metadata mappings. An attribution fills `project_key` when
/// nothing else did.
pub fn merge_enhanced(
  raw: &Metadata,
  inherited: Option<&Metadata>,
  mappings: &[MetadataMapping],
  attribution: Option<&ProjectAttribution>,
  project_key: &str,
) -> Arc<Metadata> {
  let mut merged = inherited.cloned().unwrap_or_default();
  for (key, value) in raw {
    merged.insert(key.clone(), value.clone());
  }

  for mapping in mappings.iter().filter(|m| m.enabled) {
    if let Some(value) = merged.get(&mapping.source_key).cloned() {
      merged.insert(mapping.target_key.clone(), value);
    }
  }

  if let Some(attribution) = attribution
    && merged.get(project_key).and_then(value_to_string).is_none()
  {
    merged.insert(project_key.to_string(), attribution.name.clone().into());
  }

  Arc::new(merged)
}
