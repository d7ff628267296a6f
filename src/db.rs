use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::{params, Connection, OpenFlags};

use crate::error::AppError;

pub const DEFAULT_STORE_FILE: &str = "facturas.db";

/// Locates the data directory without creating it; writers create what they need.
pub fn resolve_app_dir() -> Result<PathBuf, AppError> {
  if let Some(portable) = resolve_portable_dir() {
    return Ok(portable);
  }

  let base = dirs_next::data_local_dir()
    .ok_or_else(|| AppError::new("PATH", "local data directory not found"))?;
  Ok(base.join("FacturasPro"))
}

/// Opens an existing store for reading and writing. Never creates the file.
pub fn open_read_write(path: &Path) -> Result<Connection, AppError> {
  open_existing(path, OpenFlags::SQLITE_OPEN_READ_WRITE)
}

pub fn open_read_only(path: &Path) -> Result<Connection, AppError> {
  open_existing(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
}

fn open_existing(path: &Path, mode: OpenFlags) -> Result<Connection, AppError> {
  if !path.is_file() {
    return Err(AppError::new(
      "STORE_NOT_FOUND",
      format!("store file {} does not exist", path.display()),
    ));
  }
  let flags = mode | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
  let conn = Connection::open_with_flags(path, flags).map_err(|err| {
    AppError::new("STORE_OPEN", format!("cannot open {}: {err}", path.display()))
  })?;
  conn.busy_timeout(Duration::from_secs(5))?;
  Ok(conn)
}

pub fn table_exists(conn: &Connection, name: &str) -> Result<bool, AppError> {
  let count: i64 = conn.query_row(
    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
    params![name],
    |row| row.get(0),
  )?;
  Ok(count > 0)
}

pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, AppError> {
  let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
  let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
  let mut columns = Vec::new();
  for row in rows {
    columns.push(row?);
  }
  Ok(columns)
}

pub fn quote_ident(name: &str) -> String {
  format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn checkpoint(conn: &Connection) -> Result<(), AppError> {
  conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
  Ok(())
}

/// Creates (or reopens) a store with the companies/invoices schema.
pub fn create_demo_store(path: &Path) -> Result<Connection, AppError> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  let conn = Connection::open(path)?;
  conn.busy_timeout(Duration::from_secs(5))?;
  conn.execute_batch(include_str!("../sql/schema.sql"))?;
  Ok(conn)
}

/// Text rendering of a column value; `None` for NULL.
pub fn value_text(value: Value) -> Option<String> {
  match value {
    Value::Null => None,
    Value::Integer(v) => Some(v.to_string()),
    Value::Real(v) => Some(v.to_string()),
    Value::Text(v) => Some(v),
    Value::Blob(v) => Some(String::from_utf8_lossy(&v).into_owned()),
  }
}

fn resolve_portable_dir() -> Option<PathBuf> {
  let env_enabled = std::env::var("FACTURAS_PORTABLE")
    .ok()
    .map(|value| {
      let value = value.to_ascii_lowercase();
      value == "1" || value == "true" || value == "yes"
    })
    .unwrap_or(false);

  let exe_dir = std::env::current_exe()
    .ok()
    .and_then(|path| path.parent().map(|parent| parent.to_path_buf()));

  if let Some(exe_dir) = exe_dir {
    let flag = exe_dir.join("portable.flag");
    let data_dir = exe_dir.join("data");
    if env_enabled || flag.exists() || data_dir.exists() {
      return Some(data_dir);
    }
  }

  None
}


#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn open_missing_store_is_fatal() {
    let dir = tempdir().unwrap();
    let err = open_read_write(&dir.path().join("nope.db")).unwrap_err();
    assert_eq!(err.code, "STORE_NOT_FOUND");
    assert!(!dir.path().join("nope.db").exists());
  }

  #[test]
  fn inspects_tables_and_columns() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.db");
    drop(create_demo_store(&path).unwrap());

    let conn = open_read_only(&path).unwrap();
    assert!(table_exists(&conn, "invoices").unwrap());
    assert!(!table_exists(&conn, "payments").unwrap());
    let columns = table_columns(&conn, "invoices").unwrap();
    assert_eq!(&columns[..3], &["id", "company_id", "invoice_date"]);
  }

  #[test]
  fn read_only_store_rejects_writes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.db");
    drop(create_demo_store(&path).unwrap());

    let conn = open_read_only(&path).unwrap();
    assert!(conn.execute("DELETE FROM invoices", []).is_err());
  }

  #[test]
  fn quotes_identifiers() {
    assert_eq!(quote_ident("invoices"), "\"invoices\"");
    assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
  }
}
