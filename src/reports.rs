use chrono::Datelike;
use rusqlite::Connection;

use crate::error::Result;

// ---------------------------------------------------------------------------
// Date filter helper
// ---------------------------------------------------------------------------

fn date_filter(year: Option<i32>, month: Option<u32>) -> (String, String) {
    if let (Some(y), Some(m)) = (year, month) {
        return ("s.date LIKE ?1".to_string(), format!("{y:04}-{m:02}%"));
    }
    if let Some(y) = year {
        return ("s.date LIKE ?1".to_string(), format!("{y}%"));
    }
    // Default: current year
    let current_year = chrono::Local::now().year();
    ("s.date LIKE ?1".to_string(), format!("{current_year}%"))
}

// ---------------------------------------------------------------------------
// Commission summary per doctor
// ---------------------------------------------------------------------------

pub struct DoctorCommission {
    pub code: String,
    pub name: String,
    pub planilla_amount: f64,
    pub reten_amount: f64,
    pub commission_total: f64,
    pub service_count: i64,
}

pub struct CommissionSummary {
    pub doctors: Vec<DoctorCommission>,
    pub total_commission: f64,
}

pub fn get_commission_summary(
    conn: &Connection,
    year: Option<i32>,
    month: Option<u32>,
) -> Result<CommissionSummary> {
    let (clause, param) = date_filter(year, month);
    let sql = format!(
        "SELECT s.doctor_code, COALESCE(d.name, '(unknown)'), \
                SUM(CASE WHEN s.classification = 'planilla' THEN s.amount ELSE 0 END), \
                SUM(CASE WHEN s.classification = 'reten' THEN s.amount ELSE 0 END), \
                SUM(s.commission), COUNT(*) \
         FROM services s LEFT JOIN doctors d ON s.doctor_id = d.id \
         WHERE {clause} \
         GROUP BY s.doctor_code ORDER BY SUM(s.commission) DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let doctors: Vec<DoctorCommission> = stmt
        .query_map([&param], |row| {
            Ok(DoctorCommission {
                code: row.get(0)?,
                name: row.get(1)?,
                planilla_amount: row.get(2)?,
                reten_amount: row.get(3)?,
                commission_total: row.get(4)?,
                service_count: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let total_commission = doctors.iter().map(|d| d.commission_total).sum();
    Ok(CommissionSummary {
        doctors,
        total_commission,
    })
}

// ---------------------------------------------------------------------------
// Classification breakdown
// ---------------------------------------------------------------------------

pub struct BreakdownItem {
    pub classification: String,
    pub count: i64,
    pub amount: f64,
    pub commission: f64,
}

pub fn get_breakdown(
    conn: &Connection,
    year: Option<i32>,
    month: Option<u32>,
) -> Result<Vec<BreakdownItem>> {
    let (clause, param) = date_filter(year, month);
    let sql = format!(
        "SELECT s.classification, COUNT(*), SUM(s.amount), SUM(s.commission) \
         FROM services s WHERE {clause} \
         GROUP BY s.classification ORDER BY s.classification"
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map([&param], |row| {
            Ok(BreakdownItem {
                classification: row.get(0)?,
                count: row.get(1)?,
                amount: row.get(2)?,
                commission: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(items)
}

// ---------------------------------------------------------------------------
// Import history
// ---------------------------------------------------------------------------

pub struct ImportHistoryRow {
    pub id: i64,
    pub filename: String,
    pub import_date: String,
    pub record_count: i64,
    pub excluded_count: i64,
    pub date_range: String,
}

pub fn get_import_history(conn: &Connection) -> Result<Vec<ImportHistoryRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, filename, import_date, COALESCE(record_count, 0), \
                COALESCE(excluded_count, 0), \
                COALESCE(date_range_start, ''), COALESCE(date_range_end, '') \
         FROM imports ORDER BY import_date DESC, id DESC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let start: String = row.get(5)?;
            let end: String = row.get(6)?;
            Ok(ImportHistoryRow {
                id: row.get(0)?,
                filename: row.get(1)?,
                import_date: row.get(2)?,
                record_count: row.get(3)?,
                excluded_count: row.get(4)?,
                date_range: if start.is_empty() {
                    String::new()
                } else {
                    format!("{start} .. {end}")
                },
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn seed(conn: &Connection) {
        conn.execute(
            "INSERT INTO doctors (code, name, commission_pct) VALUES ('M042', 'Dr Perez', 30.0)",
            [],
        )
        .unwrap();
        let dr = conn.last_insert_rowid();
        let rows: &[(&str, &str, f64, f64)] = &[
            ("2025-03-10", "planilla", 200.0, 60.0),
            ("2025-03-11", "reten", 100.0, 92.5),
            ("2025-04-02", "reten", 50.0, 46.25),
        ];
        for (date, class, amount, com) in rows {
            conn.execute(
                "INSERT INTO services (doctor_id, doctor_code, date, time, amount, \
                 classification, commission) VALUES (?1, 'M042', ?2, '10:00:00', ?3, ?4, ?5)",
                rusqlite::params![dr, date, amount, class, com],
            )
            .unwrap();
        }
    }

    #[test]
    fn test_commission_summary_for_month() {
        let (_dir, conn) = test_db();
        seed(&conn);
        let summary = get_commission_summary(&conn, Some(2025), Some(3)).unwrap();
        assert_eq!(summary.doctors.len(), 1);
        let d = &summary.doctors[0];
        assert_eq!(d.name, "Dr Perez");
        assert_eq!(d.planilla_amount, 200.0);
        assert_eq!(d.reten_amount, 100.0);
        assert_eq!(d.commission_total, 152.5);
        assert_eq!(d.service_count, 2);
        assert_eq!(summary.total_commission, 152.5);
    }

    #[test]
    fn test_commission_summary_for_year() {
        let (_dir, conn) = test_db();
        seed(&conn);
        let summary = get_commission_summary(&conn, Some(2025), None).unwrap();
        assert_eq!(summary.doctors[0].service_count, 3);
        assert_eq!(summary.total_commission, 198.75);
    }

    #[test]
    fn test_breakdown() {
        let (_dir, conn) = test_db();
        seed(&conn);
        let items = get_breakdown(&conn, Some(2025), Some(3)).unwrap();
        assert_eq!(items.len(), 2);
        let planilla = items.iter().find(|i| i.classification == "planilla").unwrap();
        assert_eq!(planilla.count, 1);
        assert_eq!(planilla.amount, 200.0);
        let reten = items.iter().find(|i| i.classification == "reten").unwrap();
        assert_eq!(reten.commission, 92.5);
    }

    #[test]
    fn test_import_history() {
        let (_dir, conn) = test_db();
        conn.execute(
            "INSERT INTO imports (filename, record_count, excluded_count, date_range_start, date_range_end, checksum) \
             VALUES ('marzo.xlsx', 120, 4, '2025-03-01', '2025-03-31', 'abc')",
            [],
        )
        .unwrap();
        let rows = get_import_history(&conn).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].filename, "marzo.xlsx");
        assert_eq!(rows[0].record_count, 120);
        assert_eq!(rows[0].date_range, "2025-03-01 .. 2025-03-31");
    }
}
