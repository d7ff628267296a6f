use std::path::Path;

use crate::error::AppError;
use crate::models::RemovedInvoice;

/// Writes one line per removed invoice: id, company, rnc, number, type, reason.
pub fn export_removed_csv(rows: &[RemovedInvoice], path: &Path) -> Result<(), AppError> {
  if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)?;
  }
  let mut writer = csv::Writer::from_path(path)?;
  for row in rows {
    writer.serialize(row)?;
  }
  writer.flush()?;
  Ok(())
}
