use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::attachments::DEFAULT_ATTACHMENT_FIELD;

#[derive(Parser)]
#[command(name = "facturas-tools")]
#[command(about = "Maintenance tools for Facturas Pro stores")]
#[command(version)]
pub struct Cli {
  /// Config file (defaults to facturas-tools.toml in the data directory)
  #[arg(long, global = true, env = "FACTURAS_TOOLS_CONFIG")]
  pub config: Option<PathBuf>,

  /// Enable debug logging
  #[arg(short, long, global = true)]
  pub verbose: bool,

  #[command(subcommand)]
  pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
  /// Remove invalid, orphaned and duplicate invoices
  Clean(CleanArgs),

  /// Collapse duplicate invoices only, keeping the oldest of each group
  Dedupe(CleanArgs),

  /// Copy rows missing from the destination store
  Sync(SyncArgs),

  /// Report invoices whose attachment file is missing
  CheckAttachments(AttachmentArgs),
}

#[derive(Args)]
pub struct CleanArgs {
  /// Store file
  #[arg(long, env = "FACTURAS_STORE")]
  pub store: Option<PathBuf>,

  /// Report what would be removed, change nothing
  #[arg(long)]
  pub dry_run: bool,

  /// Skip the zip backup taken before deleting
  #[arg(long)]
  pub no_backup: bool,

  /// Write removed rows to this CSV file
  #[arg(long)]
  pub report: Option<PathBuf>,
}

#[derive(Args)]
pub struct SyncArgs {
  /// Store to copy from (opened read-only)
  #[arg(long)]
  pub source: Option<PathBuf>,

  /// Store to copy into
  #[arg(long)]
  pub destination: Option<PathBuf>,

  /// Table to synchronize [default: invoices]
  #[arg(long)]
  pub table: Option<String>,

  /// Primary key column [default: id]
  #[arg(long)]
  pub id_column: Option<String>,

  /// Count missing rows, copy nothing
  #[arg(long)]
  pub dry_run: bool,
}

#[derive(Args)]
pub struct AttachmentArgs {
  /// Store file
  #[arg(long, env = "FACTURAS_STORE")]
  pub store: Option<PathBuf>,

  /// Directory holding attachment files
  #[arg(long)]
  pub attachments_dir: Option<PathBuf>,

  /// Invoice column holding the attachment path
  #[arg(long, default_value = DEFAULT_ATTACHMENT_FIELD)]
  pub field: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::CommandFactory;

  #[test]
  fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
  }

  #[test]
  fn parses_sync_flags() {
    let cli = Cli::try_parse_from([
      "facturas-tools",
      "sync",
      "--source",
      "a.db",
      "--destination",
      "b.db",
      "--dry-run",
    ])
    .unwrap();
    match cli.command {
      Commands::Sync(args) => {
        assert_eq!(args.source, Some(PathBuf::from("a.db")));
        assert_eq!(args.table, None);
        assert!(args.dry_run);
      }
      _ => panic!("expected sync"),
    }
  }

  #[test]
  fn attachment_field_has_default() {
    let cli = Cli::try_parse_from(["facturas-tools", "check-attachments"]).unwrap();
    match cli.command {
      Commands::CheckAttachments(args) => assert_eq!(args.field, "attachment_path"),
      _ => panic!("expected check-attachments"),
    }
  }
}
