use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceType {
  Emitida,
  Gasto,
}

impl InvoiceType {
  pub const ALL: [InvoiceType; 2] = [InvoiceType::Emitida, InvoiceType::Gasto];

  pub fn as_str(self) -> &'static str {
    match self {
      InvoiceType::Emitida => "emitida",
      InvoiceType::Gasto => "gasto",
    }
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
  InvalidType,
  MissingNumber,
  UnknownCompany,
  Duplicate,
}

impl std::fmt::Display for RemovalReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let label = match self {
      RemovalReason::InvalidType => "invalid_type",
      RemovalReason::MissingNumber => "missing_number",
      RemovalReason::UnknownCompany => "unknown_company",
      RemovalReason::Duplicate => "duplicate",
    };
    f.write_str(label)
  }
}

/// Snapshot of an invoice row taken right before it was deleted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RemovedInvoice {
  pub id: i64,
  pub company_id: Option<String>,
  pub rnc: Option<String>,
  pub invoice_number: Option<String>,
  pub invoice_type: Option<String>,
  pub reason: RemovalReason,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DuplicateGroup {
  pub company_id: Option<String>,
  pub rnc: Option<String>,
  pub invoice_number: Option<String>,
  pub kept_id: i64,
  pub removed_ids: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct DuplicateReport {
  pub groups: Vec<DuplicateGroup>,
  pub removed: Vec<RemovedInvoice>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum CompanyCheck {
  Applied,
  SkippedNoTable,
  Failed(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CleanReport {
  pub removed: Vec<RemovedInvoice>,
  pub duplicate_groups: Vec<DuplicateGroup>,
  pub company_check: CompanyCheck,
  pub dry_run: bool,
}

impl CleanReport {
  pub fn count(&self, reason: RemovalReason) -> usize {
    self.removed.iter().filter(|row| row.reason == reason).count()
  }

  pub fn total_removed(&self) -> usize {
    self.removed.len()
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SyncReport {
  pub table: String,
  pub source_rows: usize,
  pub destination_keys_before: usize,
  pub rows_copied: usize,
  pub skipped_null_keys: usize,
  pub destination_unreadable: bool,
  pub dry_run: bool,
}
