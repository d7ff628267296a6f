//! Attachment existence checks against a document store and an object store.

use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info};

use crate::db::{self, quote_ident};
use crate::error::AppError;

pub const DEFAULT_ATTACHMENT_FIELD: &str = "attachment_path";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
  pub exists: bool,
  pub fields: Map<String, JsonValue>,
}

pub trait DocumentStore {
  fn get(&self, collection: &str, id: &str) -> Result<Document, AppError>;
}

pub trait ObjectStore {
  fn exists(&self, path: &str) -> Result<bool, AppError>;
}

/// Tables as collections, primary keys as document ids.
pub struct SqliteDocuments<'a> {
  conn: &'a Connection,
  id_column: String,
}

impl<'a> SqliteDocuments<'a> {
  pub fn new(conn: &'a Connection, id_column: impl Into<String>) -> Self {
    Self {
      conn,
      id_column: id_column.into(),
    }
  }

  pub fn list_ids(&self, collection: &str) -> Result<Vec<String>, AppError> {
    let mut stmt = self.conn.prepare(&format!(
      "SELECT {} FROM {} ORDER BY {}",
      quote_ident(&self.id_column),
      quote_ident(collection),
      quote_ident(&self.id_column)
    ))?;
    let rows = stmt.query_map([], |row| row.get::<_, Value>(0))?;
    let mut ids = Vec::new();
    for row in rows {
      if let Some(id) = db::value_text(row?) {
        ids.push(id);
      }
    }
    Ok(ids)
  }
}

impl DocumentStore for SqliteDocuments<'_> {
  fn get(&self, collection: &str, id: &str) -> Result<Document, AppError> {
    let mut stmt = self.conn.prepare(&format!(
      "SELECT * FROM {} WHERE {} = ?1 LIMIT 1",
      quote_ident(collection),
      quote_ident(&self.id_column)
    ))?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let mut rows = stmt.query([id])?;
    let Some(row) = rows.next()? else {
      return Ok(Document::default());
    };

    let mut fields = Map::new();
    for (index, column) in columns.into_iter().enumerate() {
      fields.insert(column, to_json(row.get::<_, Value>(index)?));
    }
    Ok(Document { exists: true, fields })
  }
}

fn to_json(value: Value) -> JsonValue {
  match value {
    Value::Null => JsonValue::Null,
    Value::Integer(v) => JsonValue::from(v),
    Value::Real(v) => JsonValue::from(v),
    Value::Text(v) => JsonValue::String(v),
    Value::Blob(v) => JsonValue::String(String::from_utf8_lossy(&v).into_owned()),
  }
}

/// Attachment files under a local directory. Absolute paths are checked as-is.
pub struct LocalObjects {
  root: PathBuf,
}

impl LocalObjects {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }
}

impl ObjectStore for LocalObjects {
  fn exists(&self, path: &str) -> Result<bool, AppError> {
    let candidate = Path::new(path);
    let full = if candidate.is_absolute() {
      candidate.to_path_buf()
    } else {
      self.root.join(path.trim_start_matches(['/', '\\']))
    };
    Ok(full.is_file())
  }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MissingAttachment {
  pub id: String,
  pub path: String,
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct AttachmentReport {
  pub checked: usize,
  pub missing_documents: Vec<String>,
  pub without_attachment: usize,
  pub present: usize,
  pub missing: Vec<MissingAttachment>,
}

pub fn check_attachments(
  docs: &dyn DocumentStore,
  objects: &dyn ObjectStore,
  collection: &str,
  ids: &[String],
  field: &str,
) -> Result<AttachmentReport, AppError> {
  let mut report = AttachmentReport::default();
  for id in ids {
    report.checked += 1;
    let document = docs.get(collection, id)?;
    if !document.exists {
      debug!(%id, "document not found");
      report.missing_documents.push(id.clone());
      continue;
    }

    let path = match document.fields.get(field) {
      Some(JsonValue::String(path)) if !path.trim().is_empty() => path.trim().to_string(),
      _ => {
        report.without_attachment += 1;
        continue;
      }
    };

    if objects.exists(&path)? {
      report.present += 1;
    } else {
      report.missing.push(MissingAttachment { id: id.clone(), path });
    }
  }

  info!(
    checked = report.checked,
    present = report.present,
    missing = report.missing.len(),
    "attachment check done"
  );
  Ok(report)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::create_demo_store;
  use crate::db::fixtures::insert_invoice;
  use rusqlite::params;
  use std::collections::HashMap;
  use tempfile::tempdir;

  struct MemoryDocuments(HashMap<String, Map<String, JsonValue>>);

  impl DocumentStore for MemoryDocuments {
    fn get(&self, _collection: &str, id: &str) -> Result<Document, AppError> {
      Ok(match self.0.get(id) {
        Some(fields) => Document {
          exists: true,
          fields: fields.clone(),
        },
        None => Document::default(),
      })
    }
  }

  struct MemoryObjects(Vec<String>);

  impl ObjectStore for MemoryObjects {
    fn exists(&self, path: &str) -> Result<bool, AppError> {
      Ok(self.0.iter().any(|known| known == path))
    }
  }

  fn fields(path: Option<&str>) -> Map<String, JsonValue> {
    let mut map = Map::new();
    map.insert("numero_factura".to_string(), JsonValue::from("B0100000001"));
    if let Some(path) = path {
      map.insert("attachment_path".to_string(), JsonValue::from(path));
    }
    map
  }

  #[test]
  fn classifies_each_document() {
    let mut docs = HashMap::new();
    docs.insert("a".to_string(), fields(Some("facturas/a.pdf")));
    docs.insert("b".to_string(), fields(Some("facturas/b.pdf")));
    docs.insert("c".to_string(), fields(None));
    docs.insert("d".to_string(), fields(Some("  ")));
    let docs = MemoryDocuments(docs);
    let objects = MemoryObjects(vec!["facturas/a.pdf".to_string()]);
    let ids: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(|id| id.to_string()).collect();

    let report = check_attachments(&docs, &objects, "invoices", &ids, DEFAULT_ATTACHMENT_FIELD).unwrap();

    assert_eq!(report.checked, 5);
    assert_eq!(report.present, 1);
    assert_eq!(report.without_attachment, 2);
    assert_eq!(report.missing_documents, vec!["e".to_string()]);
    assert_eq!(
      report.missing,
      vec![MissingAttachment {
        id: "b".to_string(),
        path: "facturas/b.pdf".to_string()
      }]
    );
  }

  #[test]
  fn sqlite_documents_expose_row_fields() {
    let dir = tempdir().unwrap();
    let conn = create_demo_store(&dir.path().join("store.db")).unwrap();
    insert_invoice(&conn, 7, Some(2), "101", Some("A1"), "gasto");

    let docs = SqliteDocuments::new(&conn, "id");
    let document = docs.get("invoices", "7").unwrap();
    let missing = docs.get("invoices", "8").unwrap();

    assert!(document.exists);
    assert_eq!(document.fields["invoice_number"], JsonValue::from("A1"));
    assert_eq!(document.fields["company_id"], JsonValue::from(2));
    assert!(!missing.exists);
    assert_eq!(docs.list_ids("invoices").unwrap(), vec!["7".to_string()]);
  }

  #[test]
  fn checks_local_attachment_directory() {
    let dir = tempdir().unwrap();
    let attachments = dir.path().join("adjuntos");
    std::fs::create_dir_all(attachments.join("2024")).unwrap();
    std::fs::write(attachments.join("2024").join("a.pdf"), b"%PDF").unwrap();

    let conn = create_demo_store(&dir.path().join("store.db")).unwrap();
    insert_invoice(&conn, 1, Some(1), "101", Some("A1"), "emitida");
    insert_invoice(&conn, 2, Some(1), "101", Some("A2"), "emitida");
    insert_invoice(&conn, 3, Some(1), "101", Some("A3"), "emitida");
    conn
      .execute("UPDATE invoices SET attachment_path = ?1 WHERE id = 1", params!["2024/a.pdf"])
      .unwrap();
    conn
      .execute("UPDATE invoices SET attachment_path = ?1 WHERE id = 2", params!["2024/b.pdf"])
      .unwrap();

    let docs = SqliteDocuments::new(&conn, "id");
    let objects = LocalObjects::new(&attachments);
    let ids = docs.list_ids("invoices").unwrap();
    let report = check_attachments(&docs, &objects, "invoices", &ids, DEFAULT_ATTACHMENT_FIELD).unwrap();

    assert_eq!(report.present, 1);
    assert_eq!(report.without_attachment, 1);
    assert_eq!(report.missing.len(), 1);
    assert_eq!(report.missing[0].id, "2");
  }
}
