//! Invoice cleanup: validity sweeps followed by duplicate collapsing on
//! `(company_id, invoice_number, rnc)`, keeping the lowest id per group.

use std::collections::HashMap;

use rusqlite::types::Value;
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::db::{self, value_text};
use crate::error::AppError;
use crate::models::{
  CleanReport, CompanyCheck, DuplicateGroup, DuplicateReport, InvoiceType, RemovalReason, RemovedInvoice,
};

pub const INVOICES_TABLE: &str = "invoices";
pub const COMPANIES_TABLE: &str = "companies";

/// `(company_id, rnc, invoice_number)` as rendered text.
type GroupKey = (Option<String>, Option<String>, Option<String>);

const DUPLICATE_PREDICATE: &str = "id NOT IN (SELECT MIN(id) FROM invoices WHERE id IS NOT NULL GROUP BY company_id, invoice_number, rnc)";

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanOptions {
  /// Run every step, report, then roll back.
  pub dry_run: bool,
}

/// Collapses duplicate invoices only. No validity sweeps run.
pub fn find_and_clean_duplicates(conn: &mut Connection, options: &CleanOptions) -> Result<DuplicateReport, AppError> {
  let tx = conn.transaction()?;
  let report = collapse_duplicates(&tx)?;
  if options.dry_run {
    info!(removed = report.removed.len(), "dry run, rolling back duplicate cleanup");
    tx.rollback()?;
  } else {
    tx.commit()?;
  }
  Ok(report)
}

/// Full cleanup: invalid types, missing numbers, unknown companies, then duplicates.
/// All deletions commit together; the company sweep is best-effort.
pub fn clean(conn: &mut Connection, options: &CleanOptions) -> Result<CleanReport, AppError> {
  let tx = conn.transaction()?;
  let mut removed = Vec::new();

  removed.extend(sweep(&tx, RemovalReason::InvalidType, &invalid_type_predicate())?);
  removed.extend(sweep(
    &tx,
    RemovalReason::MissingNumber,
    "invoice_number IS NULL OR TRIM(invoice_number) = ''",
  )?);

  let company_check = sweep_unknown_companies(&tx, &mut removed);

  let duplicates = collapse_duplicates(&tx)?;
  removed.extend(duplicates.removed);

  let report = CleanReport {
    removed,
    duplicate_groups: duplicates.groups,
    company_check,
    dry_run: options.dry_run,
  };

  if options.dry_run {
    info!(removed = report.total_removed(), "dry run, rolling back cleanup");
    tx.rollback()?;
  } else {
    tx.commit()?;
    info!(removed = report.total_removed(), "cleanup committed");
  }
  Ok(report)
}

fn invalid_type_predicate() -> String {
  let allowed = InvoiceType::ALL
    .iter()
    .map(|kind| format!("'{}'", kind.as_str()))
    .collect::<Vec<_>>()
    .join(", ");
  format!("invoice_type IS NULL OR invoice_type NOT IN ({allowed})")
}

fn sweep_unknown_companies(conn: &Connection, removed: &mut Vec<RemovedInvoice>) -> CompanyCheck {
  match db::table_exists(conn, COMPANIES_TABLE) {
    Ok(true) => {}
    Ok(false) => {
      info!("no companies table, skipping company check");
      return CompanyCheck::SkippedNoTable;
    }
    Err(err) => {
      warn!(error = %err, "companies lookup failed, skipping company check");
      return CompanyCheck::Failed(err.to_string());
    }
  }

  match db::table_columns(conn, COMPANIES_TABLE) {
    Ok(columns) if columns.iter().any(|column| column == "id") => {}
    Ok(_) => {
      warn!("companies table has no id column, skipping company check");
      return CompanyCheck::Failed("companies table has no id column".to_string());
    }
    Err(err) => {
      warn!(error = %err, "companies columns unreadable, skipping company check");
      return CompanyCheck::Failed(err.to_string());
    }
  }

  // NULL company ids are unassigned invoices, not orphans.
  let predicate = "company_id IS NOT NULL AND company_id NOT IN (SELECT c.id FROM companies AS c WHERE c.id IS NOT NULL)";
  match sweep(conn, RemovalReason::UnknownCompany, predicate) {
    Ok(rows) => {
      removed.extend(rows);
      CompanyCheck::Applied
    }
    Err(err) => {
      warn!(error = %err, "company check failed, continuing");
      CompanyCheck::Failed(err.to_string())
    }
  }
}

fn collapse_duplicates(conn: &Connection) -> Result<DuplicateReport, AppError> {
  let mut stmt = conn.prepare(
    "SELECT company_id, rnc, invoice_number, MIN(id)
     FROM invoices
     WHERE id IS NOT NULL
     GROUP BY company_id, invoice_number, rnc
     HAVING COUNT(*) > 1
     ORDER BY MIN(id)",
  )?;
  let rows = stmt.query_map([], |row| {
    Ok(DuplicateGroup {
      company_id: value_text(row.get::<_, Value>(0)?),
      rnc: value_text(row.get::<_, Value>(1)?),
      invoice_number: value_text(row.get::<_, Value>(2)?),
      kept_id: row.get(3)?,
      removed_ids: Vec::new(),
    })
  })?;
  let mut groups = Vec::new();
  for row in rows {
    groups.push(row?);
  }
  info!(groups = groups.len(), "duplicate groups found");

  let index: HashMap<GroupKey, usize> = groups
    .iter()
    .enumerate()
    .map(|(position, group)| {
      let key = (group.company_id.clone(), group.rnc.clone(), group.invoice_number.clone());
      (key, position)
    })
    .collect();

  let removed = sweep(conn, RemovalReason::Duplicate, DUPLICATE_PREDICATE)?;
  for row in &removed {
    let key = (row.company_id.clone(), row.rnc.clone(), row.invoice_number.clone());
    if let Some(&position) = index.get(&key) {
      groups[position].removed_ids.push(row.id);
    }
  }

  Ok(DuplicateReport { groups, removed })
}

/// Captures then deletes every invoice matching `predicate`.
fn sweep(conn: &Connection, reason: RemovalReason, predicate: &str) -> Result<Vec<RemovedInvoice>, AppError> {
  let mut stmt = conn.prepare(&format!(
    "SELECT id, company_id, rnc, invoice_number, invoice_type FROM invoices WHERE {predicate} ORDER BY id"
  ))?;
  let rows = stmt.query_map([], |row| {
    Ok(RemovedInvoice {
      id: row.get(0)?,
      company_id: value_text(row.get::<_, Value>(1)?),
      rnc: value_text(row.get::<_, Value>(2)?),
      invoice_number: value_text(row.get::<_, Value>(3)?),
      invoice_type: value_text(row.get::<_, Value>(4)?),
      reason,
    })
  })?;
  let mut removed = Vec::new();
  for row in rows {
    removed.push(row?);
  }

  let deleted = conn.execute(&format!("DELETE FROM invoices WHERE {predicate}"), [])?;
  debug_assert_eq!(deleted, removed.len());
  debug!(%reason, deleted, "sweep done");
  Ok(removed)
}
