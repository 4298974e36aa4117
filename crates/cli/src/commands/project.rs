//! Project command: show the attribution and enhanced metadata of a document

use std::path::Path;

use anyhow::{Result, bail};
use tgindex::storage::normalize;

use super::Vault;

pub async fn cmd_project(vault: &Path, file: &str) -> Result<()> {
  let vault = Vault::open(vault)?;
  let coordinator = vault.coordinator();
  let path = normalize(file);

  let Some(data) = coordinator.get_project_data(&path).await else {
    coordinator.destroy().await;
    bail!("Could not resolve project data for {}", path);
  };

  println!("{}", serde_json::to_string_pretty(&data)?);
  coordinator.destroy().await;
  Ok(())
}
