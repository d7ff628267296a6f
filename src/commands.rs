use std::path::PathBuf;

use tracing::info;

use crate::attachments::{self, LocalObjects, SqliteDocuments};
use crate::cli::{AttachmentArgs, CleanArgs, Commands, SyncArgs};
use crate::config::ToolConfig;
use crate::db;
use crate::dedup::{self, CleanOptions, INVOICES_TABLE};
use crate::error::AppError;
use crate::export::csv;
use crate::files::backup;
use crate::models::{CompanyCheck, DuplicateGroup, RemovalReason, RemovedInvoice};
use crate::sync::{self, SyncOptions};

pub struct Context {
  /// `None` when no local data directory could be located.
  pub app_dir: Option<PathBuf>,
  pub config: ToolConfig,
}

pub fn run(ctx: &Context, command: Commands) -> Result<(), AppError> {
  match command {
    Commands::Clean(args) => clean(ctx, args, false),
    Commands::Dedupe(args) => clean(ctx, args, true),
    Commands::Sync(args) => sync_stores(ctx, args),
    Commands::CheckAttachments(args) => check_attachments(ctx, args),
  }
}

fn clean(ctx: &Context, args: CleanArgs, duplicates_only: bool) -> Result<(), AppError> {
  let store = ctx.config.store_path(args.store, ctx.app_dir.as_deref())?;
  let mut conn = db::open_read_write(&store)?;
  if !db::table_exists(&conn, INVOICES_TABLE)? {
    return Err(AppError::new(
      "STORE_SCHEMA",
      format!("{} has no {INVOICES_TABLE} table", store.display()),
    ));
  }
  info!(store = %store.display(), duplicates_only, dry_run = args.dry_run, "cleaning store");

  if !args.dry_run && !args.no_backup {
    let backup_dir = ctx.config.backup_dir(ctx.app_dir.as_deref())?;
    let archive = backup::create_backup(&conn, &store, &backup_dir)?;
    println!("Backup written to {}", archive.display());
  }

  let options = CleanOptions { dry_run: args.dry_run };
  let removed = if duplicates_only {
    let report = dedup::find_and_clean_duplicates(&mut conn, &options)?;
    print_groups(&report.groups);
    report.removed
  } else {
    let report = dedup::clean(&mut conn, &options)?;
    println!("Invalid invoice type:   {}", report.count(RemovalReason::InvalidType));
    println!("Missing invoice number: {}", report.count(RemovalReason::MissingNumber));
    match &report.company_check {
      CompanyCheck::Applied => println!("Unknown company:        {}", report.count(RemovalReason::UnknownCompany)),
      CompanyCheck::SkippedNoTable => println!("Unknown company:        skipped (no companies table)"),
      CompanyCheck::Failed(message) => println!("Unknown company:        skipped ({message})"),
    }
    print_groups(&report.duplicate_groups);
    report.removed
  };

  if let Some(path) = args.report {
    csv::export_removed_csv(&removed, &path)?;
    println!("Report written to {}", path.display());
  }

  print_outcome(&removed, args.dry_run);
  Ok(())
}

fn print_groups(groups: &[DuplicateGroup]) {
  println!("Duplicate groups:       {}", groups.len());
  for group in groups {
    println!(
      "  company={} rnc={} number={} kept={} removed={:?}",
      group.company_id.as_deref().unwrap_or("-"),
      group.rnc.as_deref().unwrap_or("-"),
      group.invoice_number.as_deref().unwrap_or("-"),
      group.kept_id,
      group.removed_ids
    );
  }
}

fn print_outcome(removed: &[RemovedInvoice], dry_run: bool) {
  match (removed.len(), dry_run) {
    (0, _) => println!("No invoices to remove, store is clean."),
    (count, true) => println!("Dry run: {count} invoices would be removed, nothing changed."),
    (count, false) => println!("Done: {count} invoices removed."),
  }
}

fn sync_stores(ctx: &Context, args: SyncArgs) -> Result<(), AppError> {
  let source = ctx.config.sync_source(args.source)?;
  let destination = ctx.config.sync_destination(args.destination)?;
  let options = SyncOptions {
    table: ctx.config.sync_table(args.table),
    id_column: ctx.config.sync_id_column(args.id_column),
    dry_run: args.dry_run,
  };

  let report = sync::sync(&source, &destination, &options)?;

  println!("Source rows:            {}", report.source_rows);
  if report.destination_unreadable {
    println!("Destination keys:       unreadable, treated as empty");
  } else {
    println!("Destination keys:       {}", report.destination_keys_before);
  }
  if report.skipped_null_keys > 0 {
    println!("Skipped (no key):       {}", report.skipped_null_keys);
  }
  match (report.rows_copied, report.dry_run) {
    (0, _) => println!("Already synchronized, 0 rows copied."),
    (count, true) => println!("Dry run: {count} rows would be copied into {}.", report.table),
    (count, false) => println!("Done: {count} rows copied into {}.", report.table),
  }
  Ok(())
}

fn check_attachments(ctx: &Context, args: AttachmentArgs) -> Result<(), AppError> {
  let store = ctx.config.store_path(args.store, ctx.app_dir.as_deref())?;
  let attachments_dir = ctx.config.attachments_dir(args.attachments_dir, ctx.app_dir.as_deref())?;
  let conn = db::open_read_only(&store)?;

  let docs = SqliteDocuments::new(&conn, "id");
  let objects = LocalObjects::new(attachments_dir);
  let ids = docs.list_ids(INVOICES_TABLE)?;
  let report = attachments::check_attachments(&docs, &objects, INVOICES_TABLE, &ids, &args.field)?;

  println!("Invoices checked:       {}", report.checked);
  println!("Without attachment:     {}", report.without_attachment);
  println!("Attachment present:     {}", report.present);
  println!("Attachment missing:     {}", report.missing.len());
  for missing in &report.missing {
    println!("  invoice {} -> {}", missing.id, missing.path);
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::fixtures::{insert_company, insert_invoice, invoice_ids};
  use tempfile::tempdir;

  fn context(app_dir: PathBuf) -> Context {
    Context {
      app_dir: Some(app_dir),
      config: ToolConfig::default(),
    }
  }

  fn clean_args(report: Option<PathBuf>) -> CleanArgs {
    CleanArgs {
      store: None,
      dry_run: false,
      no_backup: false,
      report,
    }
  }

  #[test]
  fn clean_backs_up_then_writes_report() {
    let dir = tempdir().unwrap();
    let ctx = context(dir.path().to_path_buf());
    let store = dir.path().join(db::DEFAULT_STORE_FILE);
    let conn = db::create_demo_store(&store).unwrap();
    insert_company(&conn, 5);
    insert_invoice(&conn, 10, Some(5), "101-1", Some("A1"), "emitida");
    insert_invoice(&conn, 11, Some(5), "101-1", Some("A1"), "emitida");
    insert_invoice(&conn, 12, Some(5), "101-1", Some("A1"), "emitida");
    drop(conn);
    let report_path = dir.path().join("removed.csv");

    run(&ctx, Commands::Clean(clean_args(Some(report_path.clone())))).unwrap();

    let conn = db::open_read_only(&store).unwrap();
    assert_eq!(invoice_ids(&conn), vec![10]);
    let backups: Vec<_> = std::fs::read_dir(dir.path().join("Backups")).unwrap().collect();
    assert_eq!(backups.len(), 1);
    let report = std::fs::read_to_string(&report_path).unwrap();
    assert_eq!(report.lines().count(), 3);
  }

  #[test]
  fn clean_refuses_store_without_invoices() {
    let dir = tempdir().unwrap();
    let ctx = context(dir.path().to_path_buf());
    let store = dir.path().join(db::DEFAULT_STORE_FILE);
    let conn = db::create_demo_store(&store).unwrap();
    conn.execute_batch("DROP TABLE invoices").unwrap();
    drop(conn);

    let err = run(&ctx, Commands::Dedupe(clean_args(None))).unwrap_err();
    assert_eq!(err.code, "STORE_SCHEMA");
  }

  #[test]
  fn sync_with_explicit_paths_needs_no_data_directory() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("laptop.db");
    let destination = dir.path().join("office.db");
    let conn = db::create_demo_store(&source).unwrap();
    insert_invoice(&conn, 1, Some(1), "101", Some("A1"), "emitida");
    drop(conn);
    drop(db::create_demo_store(&destination).unwrap());
    let ctx = Context {
      app_dir: None,
      config: ToolConfig::default(),
    };
    let args = SyncArgs {
      source: Some(source),
      destination: Some(destination.clone()),
      table: None,
      id_column: None,
      dry_run: false,
    };

    run(&ctx, Commands::Sync(args)).unwrap();

    let conn = db::open_read_only(&destination).unwrap();
    assert_eq!(invoice_ids(&conn), vec![1]);
  }

  #[test]
  fn clean_without_data_directory_needs_store_flag() {
    let ctx = Context {
      app_dir: None,
      config: ToolConfig::default(),
    };

    let err = run(&ctx, Commands::Clean(clean_args(None))).unwrap_err();
    assert_eq!(err.code, "PATH");
  }

  #[test]
  fn sync_requires_both_paths() {
    let dir = tempdir().unwrap();
    let ctx = context(dir.path().to_path_buf());
    let args = SyncArgs {
      source: Some(dir.path().join("a.db")),
      destination: None,
      table: None,
      id_column: None,
      dry_run: false,
    };

    let err = run(&ctx, Commands::Sync(args)).unwrap_err();
    assert_eq!(err.code, "CONFIG");
  }
}
