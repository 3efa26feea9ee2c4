use rusqlite::Connection;

use crate::error::{Result, RetenError};

pub struct ApprovalResult {
    pub approved: usize,
    pub skipped_flagged: usize,
    pub already_approved: usize,
}

/// Bulk-approve a month of classified services, optionally for one doctor.
/// Flagged rows are skipped until reviewed; the operation is rerunnable and
/// reports aggregate counts instead of failing partway.
pub fn approve_month(
    conn: &Connection,
    month: &str,
    doctor_code: Option<&str>,
) -> Result<ApprovalResult> {
    if month.len() != 7 || !month.chars().enumerate().all(|(i, c)| {
        if i == 4 { c == '-' } else { c.is_ascii_digit() }
    }) {
        return Err(RetenError::Other(format!(
            "Invalid month '{month}' (expected YYYY-MM)"
        )));
    }
    let prefix = format!("{month}%");
    let doctor_clause = doctor_code.map(|_| "AND doctor_code = ?2").unwrap_or("");

    let count = |status_clause: &str| -> Result<usize> {
        let sql = format!(
            "SELECT count(*) FROM services WHERE date LIKE ?1 {doctor_clause} {status_clause}"
        );
        let n: i64 = match doctor_code {
            Some(code) => conn.query_row(&sql, rusqlite::params![prefix, code], |r| r.get(0))?,
            None => conn.query_row(&sql, [&prefix], |r| r.get(0))?,
        };
        Ok(n as usize)
    };

    let skipped_flagged = count("AND status = 'pending' AND is_flagged = 1")?;
    let already_approved = count("AND status = 'approved'")?;

    let sql = format!(
        "UPDATE services SET status = 'approved' \
         WHERE date LIKE ?1 {doctor_clause} AND status = 'pending' AND is_flagged = 0"
    );
    let approved = match doctor_code {
        Some(code) => conn.execute(&sql, rusqlite::params![prefix, code])?,
        None => conn.execute(&sql, [&prefix])?,
    };

    Ok(ApprovalResult {
        approved,
        skipped_flagged,
        already_approved,
    })
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

    fn add_service(conn: &Connection, code: &str, date: &str, flagged: bool, status: &str) {
        conn.execute(
            "INSERT INTO services (doctor_code, date, time, amount, classification, \
             commission, is_flagged, status) \
             VALUES (?1, ?2, '10:00:00', 100.0, 'reten', 92.5, ?3, ?4)",
            rusqlite::params![code, date, flagged as i64, status],
        )
        .unwrap();
    }

    #[test]
    fn test_approve_month() {
        let (_dir, conn) = test_db();
        add_service(&conn, "M042", "2025-03-10", false, "pending");
        add_service(&conn, "M042", "2025-03-11", true, "pending");
        add_service(&conn, "M042", "2025-03-12", false, "approved");
        add_service(&conn, "M042", "2025-04-01", false, "pending");

        let result = approve_month(&conn, "2025-03", None).unwrap();
        assert_eq!(result.approved, 1);
        assert_eq!(result.skipped_flagged, 1);
        assert_eq!(result.already_approved, 1);

        let pending_april: i64 = conn
            .query_row(
                "SELECT count(*) FROM services WHERE date LIKE '2025-04%' AND status = 'pending'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(pending_april, 1);
    }

    #[test]
    fn test_approve_month_is_rerunnable() {
        let (_dir, conn) = test_db();
        add_service(&conn, "M042", "2025-03-10", false, "pending");
        let r1 = approve_month(&conn, "2025-03", None).unwrap();
        assert_eq!(r1.approved, 1);
        let r2 = approve_month(&conn, "2025-03", None).unwrap();
        assert_eq!(r2.approved, 0);
        assert_eq!(r2.already_approved, 1);
    }

    #[test]
    fn test_approve_month_scoped_to_doctor() {
        let (_dir, conn) = test_db();
        add_service(&conn, "M042", "2025-03-10", false, "pending");
        add_service(&conn, "M099", "2025-03-10", false, "pending");
        let result = approve_month(&conn, "2025-03", Some("M042")).unwrap();
        assert_eq!(result.approved, 1);
        let other: String = conn
            .query_row("SELECT status FROM services WHERE doctor_code = 'M099'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(other, "pending");
    }

    #[test]
    fn test_approve_rejects_bad_month() {
        let (_dir, conn) = test_db();
        assert!(approve_month(&conn, "March", None).is_err());
        assert!(approve_month(&conn, "2025-3", None).is_err());
    }
}
