use colored::Colorize;

use crate::db::{get_connection, get_metadata};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::{get_data_dir, load_settings};

fn count(conn: &rusqlite::Connection, sql: &str) -> Result<i64> {
    Ok(conn.query_row(sql, [], |row| row.get(0))?)
}

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = get_data_dir().join("reten.db");
    if !db_path.exists() {
        println!("No database found at {}.", db_path.display());
        println!("Run {} first.", "reten init".bold());
        return Ok(());
    }

    let conn = get_connection(&db_path)?;
    let size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    if let Some(clinic) = get_metadata(&conn, "clinic_name") {
        println!("{}", clinic.bold());
    }
    println!("Database: {} ({})", db_path.display(), format_bytes(size));
    println!("Default insurance pct: {}", settings.default_insurance_pct);
    println!();

    let doctors = count(&conn, "SELECT COUNT(*) FROM doctors WHERE is_active = 1")?;
    let schedules = count(&conn, "SELECT COUNT(*) FROM schedules")?;
    let tariffs = count(&conn, "SELECT COUNT(*) FROM tariffs WHERE is_active = 1")?;
    let imports = count(&conn, "SELECT COUNT(*) FROM imports")?;
    let pending = count(&conn, "SELECT COUNT(*) FROM services WHERE status = 'pending'")?;
    let approved = count(&conn, "SELECT COUNT(*) FROM services WHERE status = 'approved'")?;
    let flagged = count(
        &conn,
        "SELECT COUNT(*) FROM services WHERE is_flagged = 1 AND status = 'pending'",
    )?;

    println!("Doctors:   {doctors}");
    println!("Schedules: {schedules}");
    println!("Tariffs:   {tariffs}");
    println!("Imports:   {imports}");
    println!("Services:  {pending} pending, {approved} approved");
    if flagged > 0 {
        println!(
            "{}",
            format!("{flagged} flagged services awaiting `reten review`").yellow()
        );
    }
    Ok(())
}
