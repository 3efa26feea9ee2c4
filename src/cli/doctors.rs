use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::Result;
use crate::settings::get_data_dir;

pub fn add(
    code: &str,
    name: &str,
    commission: Option<f64>,
    insurance_commission: Option<f64>,
) -> Result<()> {
    let conn = get_connection(&get_data_dir().join("reten.db"))?;
    conn.execute(
        "INSERT INTO doctors (code, name, commission_pct, insurance_pct) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![code, name, commission, insurance_commission],
    )?;
    println!("Added doctor: {code} ({name})");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = get_connection(&get_data_dir().join("reten.db"))?;
    let mut stmt = conn.prepare(
        "SELECT code, name, commission_pct, insurance_pct FROM doctors \
         WHERE is_active = 1 ORDER BY code",
    )?;
    let rows: Vec<(String, String, Option<f64>, Option<f64>)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let pct = |v: Option<f64>| v.map(|p| format!("{p}%")).unwrap_or_default();
    let mut table = Table::new();
    table.set_header(vec!["Code", "Name", "Commission", "Insurer on-call"]);
    for (code, name, commission, insurance) in rows {
        table.add_row(vec![
            Cell::new(code),
            Cell::new(name),
            Cell::new(pct(commission)),
            Cell::new(pct(insurance)),
        ]);
    }
    println!("Doctors\n{table}");
    Ok(())
}
