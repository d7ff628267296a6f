use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::db::DEFAULT_STORE_FILE;
use crate::error::AppError;

pub const CONFIG_FILE: &str = "facturas-tools.toml";
const DEFAULT_TABLE: &str = "invoices";
const DEFAULT_ID_COLUMN: &str = "id";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
  pub store: Option<PathBuf>,
  pub backup_dir: Option<PathBuf>,
  pub attachments_dir: Option<PathBuf>,
  pub sync: SyncSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSection {
  pub source: Option<PathBuf>,
  pub destination: Option<PathBuf>,
  pub table: Option<String>,
  pub id_column: Option<String>,
}

/// Loads `explicit` if given (must exist), else `<app_dir>/facturas-tools.toml` when present.
/// Without a data directory only an explicit file is read.
pub fn load_config(explicit: Option<&Path>, app_dir: Option<&Path>) -> Result<ToolConfig, AppError> {
  let path = match explicit {
    Some(path) if !path.is_file() => {
      return Err(AppError::new(
        "CONFIG",
        format!("config file {} not found", path.display()),
      ));
    }
    Some(path) => path.to_path_buf(),
    None => {
      let Some(app_dir) = app_dir else {
        debug!("no data directory, using defaults");
        return Ok(ToolConfig::default());
      };
      let default = app_dir.join(CONFIG_FILE);
      if !default.is_file() {
        debug!(path = %default.display(), "no config file, using defaults");
        return Ok(ToolConfig::default());
      }
      default
    }
  };

  let text = fs::read_to_string(&path)?;
  let config = toml::from_str(&text)?;
  debug!(path = %path.display(), "config loaded");
  Ok(config)
}

impl ToolConfig {
  pub fn store_path(&self, flag: Option<PathBuf>, app_dir: Option<&Path>) -> Result<PathBuf, AppError> {
    match flag.or_else(|| self.store.clone()) {
      Some(path) => Ok(path),
      None => in_app_dir(app_dir, DEFAULT_STORE_FILE, "--store"),
    }
  }

  pub fn backup_dir(&self, app_dir: Option<&Path>) -> Result<PathBuf, AppError> {
    match self.backup_dir.clone() {
      Some(path) => Ok(path),
      None => in_app_dir(app_dir, "Backups", "backup_dir"),
    }
  }

  pub fn attachments_dir(&self, flag: Option<PathBuf>, app_dir: Option<&Path>) -> Result<PathBuf, AppError> {
    match flag.or_else(|| self.attachments_dir.clone()) {
      Some(path) => Ok(path),
      None => in_app_dir(app_dir, "Adjuntos", "--attachments-dir"),
    }
  }

  pub fn sync_source(&self, flag: Option<PathBuf>) -> Result<PathBuf, AppError> {
    flag
      .or_else(|| self.sync.source.clone())
      .ok_or_else(|| AppError::new("CONFIG", "no source store given (--source or [sync] source)"))
  }

  pub fn sync_destination(&self, flag: Option<PathBuf>) -> Result<PathBuf, AppError> {
    flag
      .or_else(|| self.sync.destination.clone())
      .ok_or_else(|| AppError::new("CONFIG", "no destination store given (--destination or [sync] destination)"))
  }

  pub fn sync_table(&self, flag: Option<String>) -> String {
    flag
      .or_else(|| self.sync.table.clone())
      .unwrap_or_else(|| DEFAULT_TABLE.to_string())
  }

  pub fn sync_id_column(&self, flag: Option<String>) -> String {
    flag
      .or_else(|| self.sync.id_column.clone())
      .unwrap_or_else(|| DEFAULT_ID_COLUMN.to_string())
  }
}

fn in_app_dir(app_dir: Option<&Path>, name: &str, setting: &str) -> Result<PathBuf, AppError> {
  app_dir.map(|dir| dir.join(name)).ok_or_else(|| {
    AppError::new(
      "PATH",
      format!("local data directory not found, set {setting} explicitly"),
    )
  })
}
