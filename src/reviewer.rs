use rusqlite::{Connection, OptionalExtension};

use crate::classifier::Classification;
use crate::commission::{commission, DoctorRates};
use crate::error::{Result, RetenError};
use crate::importer::lookup_tariff;
use crate::settings::Settings;

pub struct FlaggedService {
    pub id: i64,
    pub date: String,
    pub time: String,
    pub doctor_code: String,
    pub doctor_name: Option<String>,
    pub patient: Option<String>,
    pub company: Option<String>,
    pub amount: f64,
    pub classification: String,
    pub commission: f64,
    pub flag_reason: Option<String>,
}

pub fn get_flagged_services(conn: &Connection) -> Result<Vec<FlaggedService>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.date, s.time, s.doctor_code, d.name, s.patient, s.company, \
                s.amount, s.classification, s.commission, s.flag_reason \
         FROM services s LEFT JOIN doctors d ON s.doctor_id = d.id \
         WHERE s.is_flagged = 1 AND s.status = 'pending' ORDER BY s.date, s.time",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(FlaggedService {
                id: row.get(0)?,
                date: row.get(1)?,
                time: row.get(2)?,
                doctor_code: row.get(3)?,
                doctor_name: row.get(4)?,
                patient: row.get(5)?,
                company: row.get(6)?,
                amount: row.get(7)?,
                classification: row.get(8)?,
                commission: row.get(9)?,
                flag_reason: row.get(10)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Manual review decision: keep or flip the classification. Either way the
/// commission is recomputed through the rule table, the audit reason records
/// the operator action, and the flag clears.
pub fn apply_review(
    conn: &Connection,
    settings: &Settings,
    service_id: i64,
    classification: Classification,
) -> Result<()> {
    let service = conn
        .query_row(
            "SELECT doctor_id, doctor_code, amount, company, tariff_code FROM services \
             WHERE id = ?1 AND status = 'pending'",
            [service_id],
            |row| {
                Ok((
                    row.get::<_, Option<i64>>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        )
        .optional()?;
    let Some((doctor_id, doctor_code, amount, company, tariff_code)) = service else {
        return Err(RetenError::Other(format!(
            "No pending service with ID {service_id}"
        )));
    };
    // A row with no resolved doctor has no rates to price with. It keeps its
    // zero commission until the doctor exists and `recalc` re-resolves it.
    let Some(doctor_id) = doctor_id else {
        return Err(RetenError::UnknownDoctor(doctor_code));
    };

    let rates = conn
        .query_row(
            "SELECT commission_pct, insurance_pct FROM doctors WHERE id = ?1",
            [doctor_id],
            |row| {
                Ok(DoctorRates {
                    commission_pct: row.get(0)?,
                    insurance_pct: row.get(1)?,
                })
            },
        )
        .optional()?
        .unwrap_or_default();
    let tariff = lookup_tariff(conn, Some(doctor_id), tariff_code.as_deref())?;
    let new_commission = commission(
        classification,
        amount,
        company.as_deref(),
        tariff_code.as_deref(),
        tariff.as_ref(),
        &rates,
        settings.default_insurance_pct,
    );

    conn.execute(
        "UPDATE services SET classification = ?1, commission = ?2, \
         reason = ?3, is_flagged = 0, flag_reason = NULL WHERE id = ?4",
        rusqlite::params![
            classification.as_str(),
            new_commission,
            format!("manually set to {}", classification.as_str()),
            service_id,
        ],
    )?;
    Ok(())
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

    fn add_flagged_service(conn: &Connection) -> i64 {
        conn.execute(
            "INSERT INTO doctors (code, name, commission_pct, insurance_pct) \
             VALUES ('M042', 'Dr Perez', 30.0, NULL)",
            [],
        )
        .unwrap();
        let dr = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO services (doctor_id, doctor_code, date, time, company, tariff_code, \
             amount, classification, commission, reason, is_flagged, flag_reason) \
             VALUES (?1, 'M042', '2025-03-10', '18:00:00', 'RIMAC', '10.20.30', 100.0, \
             'reten', 92.5, 'no schedule match', 1, 'no schedule match')",
            [dr],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn test_get_flagged_services() {
        let (_dir, conn) = test_db();
        add_flagged_service(&conn);
        let flagged = get_flagged_services(&conn).unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].doctor_name.as_deref(), Some("Dr Perez"));
        assert_eq!(flagged[0].classification, "reten");
    }

    #[test]
    fn test_apply_review_flip_recomputes_commission() {
        let (_dir, conn) = test_db();
        let id = add_flagged_service(&conn);
        apply_review(&conn, &Settings::default(), id, Classification::Planilla).unwrap();
        let (class, commission, flagged, reason): (String, f64, i64, String) = conn
            .query_row(
                "SELECT classification, commission, is_flagged, reason FROM services WHERE id = ?1",
                [id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .unwrap();
        assert_eq!(class, "planilla");
        // insurer payroll rule: 100 * 30%
        assert_eq!(commission, 30.0);
        assert_eq!(flagged, 0);
        assert!(reason.contains("manually"));
    }

    #[test]
    fn test_apply_review_keep_clears_flag() {
        let (_dir, conn) = test_db();
        let id = add_flagged_service(&conn);
        apply_review(&conn, &Settings::default(), id, Classification::Reten).unwrap();
        let (class, commission, flagged): (String, f64, i64) = conn
            .query_row(
                "SELECT classification, commission, is_flagged FROM services WHERE id = ?1",
                [id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(class, "reten");
        assert_eq!(commission, 92.5);
        assert_eq!(flagged, 0);
    }

    #[test]
    fn test_apply_review_rejects_unknown_doctor_row() {
        let (_dir, conn) = test_db();
        conn.execute(
            "INSERT INTO services (doctor_id, doctor_code, date, time, company, amount, \
             classification, commission, is_flagged, flag_reason) \
             VALUES (NULL, 'X999', '2025-03-10', '18:00:00', 'RIMAC', 100.0, \
             'reten', 0.0, 1, 'unknown doctor code')",
            [],
        )
        .unwrap();
        let id = conn.last_insert_rowid();
        let err = apply_review(&conn, &Settings::default(), id, Classification::Reten);
        assert!(matches!(err, Err(RetenError::UnknownDoctor(_))));
        // The fail-safe zero commission must survive the attempt.
        let (commission, flagged): (f64, i64) = conn
            .query_row(
                "SELECT commission, is_flagged FROM services WHERE id = ?1",
                [id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(commission, 0.0);
        assert_eq!(flagged, 1);
    }

    #[test]
    fn test_apply_review_rejects_unknown_id() {
        let (_dir, conn) = test_db();
        let err = apply_review(&conn, &Settings::default(), 999, Classification::Reten);
        assert!(err.is_err());
    }

    #[test]
    fn test_flagged_listing_skips_approved() {
        let (_dir, conn) = test_db();
        let id = add_flagged_service(&conn);
        conn.execute("UPDATE services SET status = 'approved' WHERE id = ?1", [id]).unwrap();
        assert!(get_flagged_services(&conn).unwrap().is_empty());
    }
}
