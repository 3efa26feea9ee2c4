use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::classifier::{self, Classification};
use crate::commission::{commission, DoctorRates, TariffSplit};
use crate::error::{Result, RetenError};
use crate::models::{ScheduleSlot, ServiceRow};
use crate::parser::FormatKind;
use crate::settings::Settings;

// ---------------------------------------------------------------------------
// Reference-data lookups
// ---------------------------------------------------------------------------

struct ResolvedDoctor {
    id: i64,
    rates: DoctorRates,
}

fn find_doctor(conn: &Connection, code: &str) -> Result<Option<ResolvedDoctor>> {
    let row = conn
        .query_row(
            "SELECT id, commission_pct, insurance_pct FROM doctors \
             WHERE code = ?1 AND is_active = 1",
            [code],
            |row| {
                Ok(ResolvedDoctor {
                    id: row.get(0)?,
                    rates: DoctorRates {
                        commission_pct: row.get(1)?,
                        insurance_pct: row.get(2)?,
                    },
                })
            },
        )
        .optional()?;
    Ok(row)
}

pub fn load_slots(conn: &Connection, doctor_id: i64, date: &str) -> Result<Vec<ScheduleSlot>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, doctor_id, date, start_time, end_time, is_payroll \
         FROM schedules WHERE doctor_id = ?1 AND date = ?2 ORDER BY id",
    )?;
    let slots = stmt
        .query_map(rusqlite::params![doctor_id, date], |row| {
            Ok(ScheduleSlot {
                id: row.get(0)?,
                doctor_id: row.get(1)?,
                date: row.get(2)?,
                start_time: row.get(3)?,
                end_time: row.get(4)?,
                is_payroll: row.get::<_, i64>(5)? != 0,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(slots)
}

/// Doctor-specific tariff first, then the general fallback.
pub fn lookup_tariff(
    conn: &Connection,
    doctor_id: Option<i64>,
    code: Option<&str>,
) -> Result<Option<TariffSplit>> {
    let Some(code) = code else {
        return Ok(None);
    };
    if let Some(doctor_id) = doctor_id {
        let specific = conn
            .query_row(
                "SELECT clinic_amount, doctor_amount FROM tariffs \
                 WHERE doctor_id = ?1 AND code = ?2 AND is_active = 1",
                rusqlite::params![doctor_id, code],
                |row| {
                    Ok(TariffSplit {
                        clinic_amount: row.get(0)?,
                        doctor_amount: row.get(1)?,
                    })
                },
            )
            .optional()?;
        if specific.is_some() {
            return Ok(specific);
        }
    }
    let general = conn
        .query_row(
            "SELECT clinic_amount, doctor_amount FROM tariffs \
             WHERE doctor_id IS NULL AND code = ?1 AND is_active = 1",
            [code],
            |row| {
                Ok(TariffSplit {
                    clinic_amount: row.get(0)?,
                    doctor_amount: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(general)
}

// ---------------------------------------------------------------------------
// Classification + pricing for one row
// ---------------------------------------------------------------------------

struct PricedService {
    doctor_id: Option<i64>,
    classification: Classification,
    schedule_id: Option<i64>,
    commission: f64,
    reason: String,
    is_flagged: bool,
    flag_reason: Option<String>,
}

fn classify_and_price(
    conn: &Connection,
    settings: &Settings,
    row: &ServiceRow,
) -> Result<PricedService> {
    let Some(doctor) = find_doctor(conn, &row.doctor_code)? else {
        // Degrade, never fail the batch: unknown doctors land as flagged
        // RETEN with no commission until reference data catches up.
        return Ok(PricedService {
            doctor_id: None,
            classification: Classification::Reten,
            schedule_id: None,
            commission: 0.0,
            reason: "unknown doctor code".to_string(),
            is_flagged: true,
            flag_reason: Some(format!("unknown doctor code '{}'", row.doctor_code)),
        });
    };

    let slots = load_slots(conn, doctor.id, &row.date)?;
    let hint = classifier::has_reten_hint(row.attention_type.as_deref(), row.area.as_deref());
    let outcome = classifier::classify(&row.time, hint, &slots);

    let tariff = lookup_tariff(conn, Some(doctor.id), row.tariff_code.as_deref())?;
    let amount = commission(
        outcome.classification,
        row.amount,
        row.company.as_deref(),
        row.tariff_code.as_deref(),
        tariff.as_ref(),
        &doctor.rates,
        settings.default_insurance_pct,
    );

    let flag_reason = outcome.is_flagged.then(|| outcome.reason.clone());
    Ok(PricedService {
        doctor_id: Some(doctor.id),
        classification: outcome.classification,
        schedule_id: outcome.schedule_id,
        commission: amount,
        reason: outcome.reason,
        is_flagged: outcome.is_flagged,
        flag_reason,
    })
}

// ---------------------------------------------------------------------------
// import_file
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub excluded: usize,
    pub malformed: usize,
    pub flagged: usize,
    pub duplicate_file: bool,
}

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn is_duplicate_row(conn: &Connection, row: &ServiceRow) -> Result<bool> {
    let mut stmt = conn.prepare_cached(
        "SELECT 1 FROM services WHERE doctor_code = ?1 AND date = ?2 \
         AND time = ?3 AND amount = ?4 AND COALESCE(tariff_code, '') = ?5",
    )?;
    Ok(stmt.exists(rusqlite::params![
        row.doctor_code,
        row.date,
        row.time,
        row.amount,
        row.tariff_code.as_deref().unwrap_or(""),
    ])?)
}

pub fn import_file(
    conn: &Connection,
    settings: &Settings,
    file_path: &Path,
    format_key: Option<&str>,
) -> Result<ImportResult> {
    let checksum = compute_checksum(file_path)?;
    {
        let mut stmt = conn.prepare("SELECT 1 FROM imports WHERE checksum = ?1")?;
        if stmt.exists([&checksum])? {
            return Ok(ImportResult {
                duplicate_file: true,
                ..ImportResult::default()
            });
        }
    }

    let format = if let Some(key) = format_key {
        FormatKind::get_by_key(key).ok_or_else(|| RetenError::UnknownFormat(key.to_string()))?
    } else {
        FormatKind::for_file(file_path).ok_or_else(|| {
            RetenError::UnknownFormat(file_path.to_string_lossy().to_string())
        })?
    };

    let parsed = format.parse(file_path)?;

    let mut result = ImportResult {
        excluded: parsed.excluded,
        malformed: parsed.malformed,
        ..ImportResult::default()
    };

    let dates: Vec<&str> = parsed.rows.iter().map(|r| r.date.as_str()).collect();
    let min_date = dates.iter().min().copied();
    let max_date = dates.iter().max().copied();
    conn.execute(
        "INSERT INTO imports (filename, record_count, excluded_count, date_range_start, date_range_end, checksum) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            file_path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
            parsed.rows.len() as i64,
            parsed.excluded as i64,
            min_date,
            max_date,
            checksum,
        ],
    )?;
    let import_id = conn.last_insert_rowid();

    for row in &parsed.rows {
        if is_duplicate_row(conn, row)? {
            result.skipped += 1;
            continue;
        }
        let priced = classify_and_price(conn, settings, row)?;
        conn.execute(
            "INSERT INTO services (import_id, doctor_id, doctor_code, date, time, patient, \
             company, insurance_id, tariff_code, receipt, area, attention_type, admission, \
             description, amount, classification, schedule_id, commission, reason, is_flagged, \
             flag_reason) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
             ?17, ?18, ?19, ?20, ?21)",
            rusqlite::params![
                import_id,
                priced.doctor_id,
                row.doctor_code,
                row.date,
                row.time,
                row.patient,
                row.company,
                row.insurance_id,
                row.tariff_code,
                row.receipt,
                row.area,
                row.attention_type,
                row.admission,
                row.description.as_deref().or(row.service.as_deref()),
                row.amount,
                priced.classification.as_str(),
                priced.schedule_id,
                priced.commission,
                priced.reason,
                priced.is_flagged as i64,
                priced.flag_reason,
            ],
        )?;
        result.imported += 1;
        if priced.is_flagged {
            result.flagged += 1;
        }
    }

    Ok(result)
}

// ---------------------------------------------------------------------------
// Recalculation: pending rows only, approved rows are immutable
// ---------------------------------------------------------------------------

pub struct RecalcResult {
    pub recalculated: usize,
    pub still_flagged: usize,
}

pub fn recalculate_pending(conn: &Connection, settings: &Settings) -> Result<RecalcResult> {
    let mut stmt = conn.prepare(
        "SELECT id, doctor_code, date, time, amount, company, tariff_code, area, attention_type \
         FROM services WHERE status = 'pending'",
    )?;
    let pending: Vec<(i64, ServiceRow)> = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                ServiceRow {
                    doctor_code: row.get(1)?,
                    date: row.get(2)?,
                    time: row.get(3)?,
                    amount: row.get(4)?,
                    company: row.get(5)?,
                    tariff_code: row.get(6)?,
                    area: row.get(7)?,
                    attention_type: row.get(8)?,
                    ..ServiceRow::default()
                },
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut result = RecalcResult {
        recalculated: 0,
        still_flagged: 0,
    };
    for (id, row) in &pending {
        let priced = classify_and_price(conn, settings, row)?;
        conn.execute(
            "UPDATE services SET doctor_id = ?1, classification = ?2, schedule_id = ?3, \
             commission = ?4, reason = ?5, is_flagged = ?6, flag_reason = ?7 WHERE id = ?8",
            rusqlite::params![
                priced.doctor_id,
                priced.classification.as_str(),
                priced.schedule_id,
                priced.commission,
                priced.reason,
                priced.is_flagged as i64,
                priced.flag_reason,
                id,
            ],
        )?;
        result.recalculated += 1;
        if priced.is_flagged {
            result.still_flagged += 1;
        }
    }
    Ok(result)
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

    fn add_doctor(conn: &Connection, code: &str, commission: Option<f64>, insurance: Option<f64>) -> i64 {
        conn.execute(
            "INSERT INTO doctors (code, name, commission_pct, insurance_pct) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![code, format!("Dr {code}"), commission, insurance],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn add_slot(conn: &Connection, doctor_id: i64, date: &str, start: &str, end: &str, payroll: bool) {
        conn.execute(
            "INSERT INTO schedules (doctor_id, date, start_time, end_time, is_payroll) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![doctor_id, date, start, end, payroll as i64],
        )
        .unwrap();
    }

    fn write_ledger(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let content = format!(
            "cod_seri,fecha,hora,importe,cia,comprobante,cod_seg,paciente,tipoate\n{body}"
        );
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_import_three_row_scenario() {
        // One row inside a payroll slot, one inside an on-call slot, one
        // with no slot at all: exactly one PLANILLA and two RETEN.
        let (dir, conn) = test_db();
        let settings = Settings::default();
        let dr_a = add_doctor(&conn, "M042", Some(30.0), None);
        let dr_b = add_doctor(&conn, "M099", None, Some(85.0));
        add_slot(&conn, dr_a, "2025-03-10", "08:00", "14:00", true);
        add_slot(&conn, dr_b, "2025-03-10", "20:00", "08:00", false);

        let path = write_ledger(
            dir.path(),
            "marzo.csv",
            "M042,10/03/2025,09:30,200.00,RIMAC,F001-01,10.20.30,PEREZ,CONSULTA\n\
             M099,10/03/2025,23:15,100.00,MAPFRE,F001-02,20.30.40,LOPEZ,RETEN\n\
             M042,10/03/2025,18:00,100.00,RIMAC,F001-03,10.20.30,DIAZ,RETEN\n",
        );
        let result = import_file(&conn, &settings, &path, None).unwrap();
        assert_eq!(result.imported, 3);
        assert_eq!(result.skipped, 0);
        assert!(!result.duplicate_file);

        let planilla: i64 = conn
            .query_row("SELECT count(*) FROM services WHERE classification = 'planilla'", [], |r| r.get(0))
            .unwrap();
        let reten: i64 = conn
            .query_row("SELECT count(*) FROM services WHERE classification = 'reten'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(planilla, 1);
        assert_eq!(reten, 2);

        // Insurer payroll commission: 200 * 30%
        let c1: f64 = conn
            .query_row("SELECT commission FROM services WHERE doctor_code = 'M042' AND time = '09:30:00'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(c1, 60.0);
        // Insurer on-call with doctor override: 100 * 85%
        let c2: f64 = conn
            .query_row("SELECT commission FROM services WHERE doctor_code = 'M099'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(c2, 85.0);
        // Unmatched on-call, insurer, no override: 100 * 92.5%
        let c3: f64 = conn
            .query_row("SELECT commission FROM services WHERE doctor_code = 'M042' AND time = '18:00:00'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(c3, 92.5);
    }

    #[test]
    fn test_import_detects_duplicate_file() {
        let (dir, conn) = test_db();
        let settings = Settings::default();
        add_doctor(&conn, "M042", Some(30.0), None);
        let path = write_ledger(
            dir.path(),
            "marzo.csv",
            "M042,10/03/2025,09:30,200.00,RIMAC,F001-01,10.20.30,PEREZ,\n",
        );
        let r1 = import_file(&conn, &settings, &path, None).unwrap();
        assert_eq!(r1.imported, 1);
        let r2 = import_file(&conn, &settings, &path, None).unwrap();
        assert!(r2.duplicate_file);
        assert_eq!(r2.imported, 0);
    }

    #[test]
    fn test_import_skips_duplicate_rows() {
        let (dir, conn) = test_db();
        let settings = Settings::default();
        add_doctor(&conn, "M042", Some(30.0), None);
        let p1 = write_ledger(
            dir.path(),
            "a.csv",
            "M042,10/03/2025,09:30,200.00,RIMAC,F001-01,10.20.30,PEREZ,\n",
        );
        import_file(&conn, &settings, &p1, None).unwrap();
        let p2 = write_ledger(
            dir.path(),
            "b.csv",
            "M042,10/03/2025,09:30,200.00,RIMAC,F001-01,10.20.30,PEREZ,\n\
             M042,11/03/2025,09:30,300.00,RIMAC,F001-09,10.20.30,ROJAS,\n",
        );
        let r2 = import_file(&conn, &settings, &p2, None).unwrap();
        assert_eq!(r2.skipped, 1);
        assert_eq!(r2.imported, 1);
    }

    #[test]
    fn test_unknown_doctor_degrades_to_flagged_reten() {
        let (dir, conn) = test_db();
        let settings = Settings::default();
        let path = write_ledger(
            dir.path(),
            "a.csv",
            "ZZZZ,10/03/2025,09:30,200.00,RIMAC,F001-01,10.20.30,PEREZ,\n",
        );
        let result = import_file(&conn, &settings, &path, None).unwrap();
        assert_eq!(result.imported, 1);
        assert_eq!(result.flagged, 1);
        let (class, commission, flag): (String, f64, String) = conn
            .query_row(
                "SELECT classification, commission, flag_reason FROM services",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(class, "reten");
        assert_eq!(commission, 0.0);
        assert!(flag.contains("unknown doctor"));
    }

    #[test]
    fn test_import_persists_optional_ledger_fields() {
        let (dir, conn) = test_db();
        let settings = Settings::default();
        add_doctor(&conn, "M042", Some(30.0), None);
        let path = dir.path().join("a.csv");
        std::fs::write(
            &path,
            "cod_seri,fecha,hora,importe,cia,segus,admision,comprobante\n\
             M042,10/03/2025,09:30,200.00,RIMAC,SEG-778,ADM-1201,F001-01\n",
        )
        .unwrap();
        import_file(&conn, &settings, &path, None).unwrap();
        let (insurance_id, admission): (String, String) = conn
            .query_row("SELECT insurance_id, admission FROM services", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(insurance_id, "SEG-778");
        assert_eq!(admission, "ADM-1201");
    }

    #[test]
    fn test_import_counts_exclusions() {
        let (dir, conn) = test_db();
        let settings = Settings::default();
        add_doctor(&conn, "M042", Some(30.0), None);
        let path = write_ledger(
            dir.path(),
            "a.csv",
            "M042,10/03/2025,09:30,200.00,PARTICULAR,-,10.20.30,PEREZ,\n\
             M042,10/03/2025,10:30,0.04,PARTICULAR,F001-01,00.19.27,PEREZ,\n\
             M042,10/03/2025,11:30,50.00,RIMAC,F001-02,10.20.30,LOPEZ,\n",
        );
        let result = import_file(&conn, &settings, &path, None).unwrap();
        assert_eq!(result.excluded, 2);
        assert_eq!(result.imported, 1);
    }

    #[test]
    fn test_recalculate_picks_up_new_schedule() {
        let (dir, conn) = test_db();
        let settings = Settings::default();
        let dr = add_doctor(&conn, "M042", Some(30.0), None);
        let path = write_ledger(
            dir.path(),
            "a.csv",
            "M042,10/03/2025,09:30,200.00,RIMAC,F001-01,10.20.30,PEREZ,\n",
        );
        let r1 = import_file(&conn, &settings, &path, None).unwrap();
        assert_eq!(r1.flagged, 1); // no schedule yet

        add_slot(&conn, dr, "2025-03-10", "08:00", "14:00", true);
        let r2 = recalculate_pending(&conn, &settings).unwrap();
        assert_eq!(r2.recalculated, 1);
        assert_eq!(r2.still_flagged, 0);

        let (class, commission): (String, f64) = conn
            .query_row("SELECT classification, commission FROM services", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(class, "planilla");
        assert_eq!(commission, 60.0);
    }

    #[test]
    fn test_recalculate_leaves_approved_rows_alone() {
        let (dir, conn) = test_db();
        let settings = Settings::default();
        let dr = add_doctor(&conn, "M042", Some(30.0), None);
        add_slot(&conn, dr, "2025-03-10", "08:00", "14:00", true);
        let path = write_ledger(
            dir.path(),
            "a.csv",
            "M042,10/03/2025,09:30,200.00,RIMAC,F001-01,10.20.30,PEREZ,\n",
        );
        import_file(&conn, &settings, &path, None).unwrap();
        conn.execute("UPDATE services SET status = 'approved'", []).unwrap();
        conn.execute("UPDATE doctors SET commission_pct = 50.0", []).unwrap();

        let r = recalculate_pending(&conn, &settings).unwrap();
        assert_eq!(r.recalculated, 0);
        let commission: f64 = conn
            .query_row("SELECT commission FROM services", [], |r| r.get(0))
            .unwrap();
        assert_eq!(commission, 60.0);
    }

    #[test]
    fn test_doctor_specific_tariff_wins_over_general() {
        let (_dir, conn) = test_db();
        let dr = add_doctor(&conn, "M042", Some(30.0), None);
        conn.execute(
            "INSERT INTO tariffs (doctor_id, code, clinic_amount, doctor_amount) VALUES (NULL, '10.20.30', 40.0, 60.0)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO tariffs (doctor_id, code, clinic_amount, doctor_amount) VALUES (?1, '10.20.30', 80.0, 0.0)",
            [dr],
        )
        .unwrap();
        let split = lookup_tariff(&conn, Some(dr), Some("10.20.30")).unwrap().unwrap();
        assert_eq!(split.clinic_amount, 80.0);
        assert_eq!(split.doctor_amount, 0.0);

        let general = lookup_tariff(&conn, None, Some("10.20.30")).unwrap().unwrap();
        assert_eq!(general.doctor_amount, 60.0);
        assert!(lookup_tariff(&conn, Some(dr), Some("99.99.99")).unwrap().is_none());
    }
}
