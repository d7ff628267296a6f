use std::path::PathBuf;

use rusqlite::{params, Connection};

use facturas_pro_tools::db;
use facturas_pro_tools::error::AppError;

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let path = std::env::args()
    .nth(1)
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("demo_facturas.db"));
  let count = std::env::args()
    .nth(2)
    .and_then(|value| value.parse::<usize>().ok())
    .unwrap_or(200);

  let mut conn = db::create_demo_store(&path)?;
  let created = seed_demo_data(&mut conn, count)?;

  println!("Seeded {} invoices in {}", created, path.display());
  Ok(())
}

fn seed_demo_data(conn: &mut Connection, count: usize) -> Result<usize, AppError> {
  let companies = [(1, "Distribuidora Caribe", "101-00001-1"), (2, "Ferreteria Central", "131-00002-2")];
  let third_parties = [
    ("401-50001-1", "Suministros del Este"),
    ("401-50002-2", "Servicios Oceano"),
    ("401-50003-3", "Papeleria Nacional"),
  ];

  let tx = conn.transaction()?;
  for (id, name, rnc) in companies {
    tx.execute(
      "INSERT OR IGNORE INTO companies (id, name, rnc) VALUES (?1, ?2, ?3)",
      params![id, name, rnc],
    )?;
  }

  let mut created = 0;
  {
    let mut stmt = tx.prepare(
      "INSERT INTO invoices (company_id, invoice_date, invoice_type, invoice_number, rnc, third_party_name, itbis, total_amount)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;

    for index in 0..count {
      let company_id = if index % 37 == 36 { 99 } else { (index % 2) as i64 + 1 };
      let invoice_type = match index % 50 {
        49 => "nota",
        _ if index % 3 == 0 => "gasto",
        _ => "emitida",
      };
      let invoice_number = if index % 41 == 40 {
        String::new()
      } else {
        format!("B01{:08}", index / 2)
      };
      let (rnc, name) = third_parties[index % third_parties.len()];
      let total = 500.0 + (index as f64 * 37.5) % 9_000.0;
      let itbis = total * 0.18;
      let day = index % 28 + 1;
      stmt.execute(params![
        company_id,
        format!("2024-03-{day:02}"),
        invoice_type,
        invoice_number,
        rnc,
        name,
        itbis,
        total
      ])?;
      created += 1;

      // every tenth invoice gets imported twice
      if index % 10 == 0 {
        stmt.execute(params![
          company_id,
          format!("2024-03-{day:02}"),
          invoice_type,
          invoice_number,
          rnc,
          name,
          itbis,
          total
        ])?;
        created += 1;
      }
    }
  }

  tx.commit()?;
  Ok(created)
}
