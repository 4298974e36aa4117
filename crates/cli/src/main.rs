//! tgindex CLI - task and project index for markdown vaults

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod logging;

use commands::{cmd_config, cmd_project, cmd_scan, cmd_watch};
use logging::init_cli_logging;

#[derive(Parser)]
#[command(name = "tgindex")]
#[command(about = "Task and project index for markdown vaults")]
#[command(after_help = "\
EXAMPLES:
  tgindex scan ~/vault --stats            # Print every task with counters
  tgindex project ~/vault Work/todo.md    # Show a document's project
  tgindex watch ~/vault                   # Keep the index current")]
struct Cli {
  /// Enable debug logging (RUST_LOG overrides)
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Parse every markdown document and print its tasks
  Scan {
    /// Vault directory
    #[arg(default_value = ".")]
    vault: PathBuf,
    /// Output as JSON
    #[arg(long)]
    json: bool,
    /// Print processing and cache statistics
    #[arg(long)]
    stats: bool,
  },
  /// Show the project attribution and enhanced metadata of a document
  Project {
    /// Vault directory
    vault: PathBuf,
    /// Vault-relative document path
    file: String,
  },
  /// Watch the vault and rescan periodically
  Watch {
    /// Vault directory
    #[arg(default_value = ".")]
    vault: PathBuf,
    /// Seconds between rescans
    #[arg(long, default_value = "30")]
    rescan_secs: u64,
  },
  /// Print the effective configuration
  Config {
    /// Vault directory
    #[arg(default_value = ".")]
    vault: PathBuf,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  init_cli_logging(cli.verbose);

  match cli.command {
    Commands::Scan { vault, json, stats } => cmd_scan(&vault, json, stats).await,
    Commands::Project { vault, file } => cmd_project(&vault, &file).await,
    Commands::Watch { vault, rescan_secs } => cmd_watch(&vault, rescan_secs).await,
    Commands::Config { vault } => cmd_config(&vault),
  }
}
