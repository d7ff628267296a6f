//! One-way store synchronization: copies rows whose primary key is present in
//! the source store but missing from the destination store.

use std::collections::HashSet;
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, info, warn};

use crate::db::{self, quote_ident};
use crate::error::AppError;
use crate::models::SyncReport;

#[derive(Debug, Clone)]
pub struct SyncOptions {
  pub table: String,
  pub id_column: String,
  pub dry_run: bool,
}

impl Default for SyncOptions {
  fn default() -> Self {
    Self {
      table: "invoices".to_string(),
      id_column: "id".to_string(),
      dry_run: false,
    }
  }
}

/// Primary-key value with store comparison semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowKey {
  Integer(i64),
  Real(u64),
  Text(String),
  Blob(Vec<u8>),
}

impl RowKey {
  pub fn from_value(value: &Value) -> Option<RowKey> {
    match value {
      Value::Null => None,
      Value::Integer(v) => Some(RowKey::Integer(*v)),
      Value::Real(v) if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v <= i64::MAX as f64 => {
        Some(RowKey::Integer(*v as i64))
      }
      Value::Real(v) => Some(RowKey::Real(v.to_bits())),
      Value::Text(v) => Some(RowKey::Text(v.clone())),
      Value::Blob(v) => Some(RowKey::Blob(v.clone())),
    }
  }
}

/// Opens both stores and copies missing rows. Both connections are closed on every return path.
pub fn sync(source: &Path, destination: &Path, options: &SyncOptions) -> Result<SyncReport, AppError> {
  let source_conn = db::open_read_only(source)?;
  let mut destination_conn = db::open_read_write(destination)?;
  info!(
    source = %source.display(),
    destination = %destination.display(),
    table = %options.table,
    "synchronizing stores"
  );
  sync_connections(&source_conn, &mut destination_conn, options)
}

pub fn sync_connections(
  source: &Connection,
  destination: &mut Connection,
  options: &SyncOptions,
) -> Result<SyncReport, AppError> {
  if !db::table_exists(source, &options.table)? {
    return Err(AppError::new(
      "SYNC_TABLE",
      format!("table {} not found in source store", options.table),
    ));
  }

  let mut report = SyncReport {
    table: options.table.clone(),
    dry_run: options.dry_run,
    ..SyncReport::default()
  };

  let existing = match destination_keys(destination, options) {
    Ok(keys) => keys,
    Err(err) => {
      warn!(error = %err, "destination keys unreadable, treating destination as empty");
      report.destination_unreadable = true;
      HashSet::new()
    }
  };
  report.destination_keys_before = existing.len();

  let mut stmt = source.prepare(&format!("SELECT * FROM {}", quote_ident(&options.table)))?;
  let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
  let key_index = columns
    .iter()
    .position(|column| column == &options.id_column)
    .ok_or_else(|| {
      AppError::new(
        "SYNC_ID_COLUMN",
        format!("column {} not found in {}", options.id_column, options.table),
      )
    })?;

  let mut pending = Vec::new();
  let mut rows = stmt.query([])?;
  while let Some(row) = rows.next()? {
    report.source_rows += 1;
    let values = (0..columns.len())
      .map(|index| row.get::<_, Value>(index))
      .collect::<Result<Vec<_>, _>>()?;
    match RowKey::from_value(&values[key_index]) {
      Some(key) if existing.contains(&key) => {}
      Some(_) => pending.push(values),
      None => report.skipped_null_keys += 1,
    }
  }
  if report.skipped_null_keys > 0 {
    warn!(rows = report.skipped_null_keys, "source rows without a key were skipped");
  }
  debug!(pending = pending.len(), "rows missing from destination");

  if options.dry_run || pending.is_empty() {
    report.rows_copied = pending.len();
    return Ok(report);
  }

  report.rows_copied = insert_rows(destination, &options.table, &columns, &pending)?;
  info!(rows = report.rows_copied, table = %options.table, "rows copied");
  Ok(report)
}

fn destination_keys(conn: &Connection, options: &SyncOptions) -> Result<HashSet<RowKey>, AppError> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM {}",
    quote_ident(&options.id_column),
    quote_ident(&options.table)
  ))?;
  let values = stmt.query_map([], |row| row.get::<_, Value>(0))?;
  let mut keys = HashSet::new();
  for value in values {
    if let Some(key) = RowKey::from_value(&value?) {
      keys.insert(key);
    }
  }
  Ok(keys)
}

/// Inserts all rows in one transaction; any failure rolls the whole batch back.
fn insert_rows(conn: &mut Connection, table: &str, columns: &[String], rows: &[Vec<Value>]) -> Result<usize, AppError> {
  let column_list = columns.iter().map(|column| quote_ident(column)).collect::<Vec<_>>().join(", ");
  let placeholders = (1..=columns.len()).map(|index| format!("?{index}")).collect::<Vec<_>>().join(", ");
  let sql = format!("INSERT INTO {} ({column_list}) VALUES ({placeholders})", quote_ident(table));

  let tx = conn.transaction()?;
  {
    let mut stmt = tx
      .prepare(&sql)
      .map_err(|err| AppError::new("SYNC_INSERT", format!("cannot prepare insert into {table}: {err}")))?;
    for row in rows {
      if let Err(err) = stmt.execute(params_from_iter(row.iter())) {
        warn!(error = %err, "insert failed, rolling back batch");
        return Err(AppError::new(
          "SYNC_INSERT",
          format!("insert into {table} failed, no rows copied: {err}"),
        ));
      }
    }
  }
  tx.commit()?;
  Ok(rows.len())
}
