//! Config command: print the effective configuration for a vault

use std::path::Path;

use anyhow::{Context, Result};

use super::Vault;

pub fn cmd_config(vault: &Path) -> Result<()> {
  let vault = Vault::open(vault)?;

  println!("# source: {}", vault.config_source);
  println!("{}", toml::to_string_pretty(&vault.config).context("Failed to serialize config")?);
  Ok(())
}
