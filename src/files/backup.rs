use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use rusqlite::Connection;
use tracing::info;
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::db;
use crate::error::AppError;

/// Zips the store file into `backup_dir`. The connection is checkpointed first
/// so a WAL journal is folded into the copied file.
pub fn create_backup(conn: &Connection, store_path: &Path, backup_dir: &Path) -> Result<PathBuf, AppError> {
  db::checkpoint(conn)?;
  fs::create_dir_all(backup_dir)?;

  let stem = store_path
    .file_stem()
    .map(|stem| stem.to_string_lossy().to_string())
    .unwrap_or_else(|| "store".to_string());
  let entry_name = store_path
    .file_name()
    .map(|name| name.to_string_lossy().to_string())
    .unwrap_or_else(|| "store.db".to_string());
  let stamp = Local::now().format("%Y%m%d_%H%M%S");
  let mut filename = backup_dir.join(format!("{stem}_{stamp}.zip"));
  let mut counter = 1;
  while filename.exists() {
    filename = backup_dir.join(format!("{stem}_{stamp}_{counter}.zip"));
    counter += 1;
  }

  let file = File::create(&filename)?;
  let mut zip = ZipWriter::new(file);
  let options = FileOptions::<()>::default().compression_method(zip::CompressionMethod::Deflated);

  zip.start_file(entry_name, options)?;
  let mut db_file = File::open(store_path)?;
  let mut buffer = Vec::new();
  db_file.read_to_end(&mut buffer)?;
  zip.write_all(&buffer)?;
  zip.finish()?;

  info!(path = %filename.display(), bytes = buffer.len(), "store backup written");
  Ok(filename)
}
