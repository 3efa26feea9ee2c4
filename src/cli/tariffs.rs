use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::{Result, RetenError};
use crate::fmt::money;
use crate::settings::get_data_dir;

pub fn add(code: &str, doctor: Option<&str>, clinic: f64, doctor_amount: f64) -> Result<()> {
    let conn = get_connection(&get_data_dir().join("reten.db"))?;

    let doctor_id: Option<i64> = match doctor {
        Some(d) => Some(
            conn.query_row("SELECT id FROM doctors WHERE code = ?1", [d], |row| row.get(0))
                .map_err(|_| RetenError::UnknownDoctor(d.to_string()))?,
        ),
        None => None,
    };

    conn.execute(
        "INSERT INTO tariffs (doctor_id, code, clinic_amount, doctor_amount) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![doctor_id, code, clinic, doctor_amount],
    )?;
    match doctor {
        Some(d) => println!("Added tariff {code} for {d}"),
        None => println!("Added general tariff {code}"),
    }
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = get_connection(&get_data_dir().join("reten.db"))?;
    let mut stmt = conn.prepare(
        "SELECT t.code, COALESCE(d.code, '(general)'), t.clinic_amount, t.doctor_amount \
         FROM tariffs t LEFT JOIN doctors d ON t.doctor_id = d.id \
         WHERE t.is_active = 1 ORDER BY t.code, d.code",
    )?;
    let rows: Vec<(String, String, f64, f64)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut table = Table::new();
    table.set_header(vec!["Code", "Doctor", "Clinic", "Doctor amt"]);
    for (code, doctor, clinic, doctor_amount) in rows {
        table.add_row(vec![
            Cell::new(code),
            Cell::new(doctor),
            Cell::new(money(clinic)),
            Cell::new(money(doctor_amount)),
        ]);
    }
    println!("Tariffs\n{table}");
    Ok(())
}
