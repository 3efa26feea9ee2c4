use comfy_table::{Cell, Table};

use crate::classifier::minutes_since_midnight;
use crate::db::get_connection;
use crate::error::{Result, RetenError};
use crate::parser::normalize_date;
use crate::settings::get_data_dir;

pub fn add(doctor: &str, date: &str, start: &str, end: &str, on_call: bool) -> Result<()> {
    let conn = get_connection(&get_data_dir().join("reten.db"))?;

    let doctor_id: i64 = conn
        .query_row("SELECT id FROM doctors WHERE code = ?1", [doctor], |row| {
            row.get(0)
        })
        .map_err(|_| RetenError::UnknownDoctor(doctor.to_string()))?;

    let date = normalize_date(date)
        .ok_or_else(|| RetenError::Other(format!("Invalid date '{date}' (expected YYYY-MM-DD)")))?;
    for t in [start, end] {
        if minutes_since_midnight(t).is_none() {
            return Err(RetenError::Other(format!("Invalid time '{t}' (expected HH:MM)")));
        }
    }

    conn.execute(
        "INSERT INTO schedules (doctor_id, date, start_time, end_time, is_payroll) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![doctor_id, date, start, end, !on_call as i64],
    )?;
    let kind = if on_call { "on-call" } else { "payroll" };
    println!("Added {kind} slot for {doctor} on {date}: {start}-{end}");
    Ok(())
}

pub fn list(date: Option<&str>) -> Result<()> {
    let conn = get_connection(&get_data_dir().join("reten.db"))?;
    let base = "SELECT d.code, s.date, s.start_time, s.end_time, s.is_payroll \
                FROM schedules s JOIN doctors d ON s.doctor_id = d.id";
    let map_row = |row: &rusqlite::Row| -> rusqlite::Result<(String, String, String, String, i64)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    };
    let rows: Vec<(String, String, String, String, i64)> = match date {
        Some(d) => {
            let mut stmt = conn.prepare(&format!("{base} WHERE s.date = ?1 ORDER BY d.code, s.id"))?;
            let rows = stmt.query_map([d], map_row)?.collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!("{base} ORDER BY s.date DESC, d.code, s.id"))?;
            let rows = stmt.query_map([], map_row)?.collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
    };

    let mut table = Table::new();
    table.set_header(vec!["Doctor", "Date", "Start", "End", "Type"]);
    for (code, date, start, end, is_payroll) in rows {
        table.add_row(vec![
            Cell::new(code),
            Cell::new(date),
            Cell::new(start),
            Cell::new(end),
            Cell::new(if is_payroll != 0 { "payroll" } else { "on-call" }),
        ]);
    }
    println!("Schedule\n{table}");
    Ok(())
}
