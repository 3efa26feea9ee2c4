use colored::Colorize;

use crate::db::{get_connection, get_metadata, set_metadata};
use crate::error::Result;
use crate::importer::import_file;
use crate::settings::{get_data_dir, load_settings};

const DEMO_LEDGER: &str = "\
COD_SERI,FECHA,HORA,IMPORTE,CIA,COD_SEG,TIPOATE,AREA,COMPROBANTE,PACIENTE
M042,2025-03-10,10:30:00,200.00,RIMAC,10.20.30,CONSULTA,CONSULTORIO,F001-1234,GARCIA LUISA
M042,2025-03-10,22:15:00,150.00,PARTICULAR,20.30.40,RETEN,EMERGENCIA,B001-0042,TORRES HUGO
M042,2025-03-10,23:40:00,100.00,PACIFICO,10.20.30,RETEN,EMERGENCIA,F001-1241,QUISPE ANA
C108,2025-03-10,09:00:00,80.00,PARTICULAR,50.01.01,CONSULTA,CONSULTORIO,B002-0310,ROJAS PEDRO
C108,2025-03-10,11:20:00,0.04,PARTICULAR,00.19.27,CONSULTA,ADMISION,B002-0311,ROJAS PEDRO
C108,2025-03-11,16:00:00,120.00,MAPFRE,30.40.50,CONSULTA,CONSULTORIO,F002-0551,VEGA MARTA
C108,2025-03-12,21:00:00,90.00,RIMAC,30.40.50,CONSULTA,EMERGENCIA,F002-0560,SOTO RAUL
";

struct DemoDoctor {
    code: &'static str,
    name: &'static str,
    commission_pct: f64,
}

const DEMO_DOCTORS: &[DemoDoctor] = &[
    DemoDoctor { code: "M042", name: "Dr. Perez, Juan", commission_pct: 30.0 },
    DemoDoctor { code: "C108", name: "Dra. Salas, Carmen", commission_pct: 25.0 },
];

pub fn run() -> Result<()> {
    let data_dir = get_data_dir();
    let settings = load_settings();
    let conn = get_connection(&data_dir.join("reten.db"))?;

    if get_metadata(&conn, "demo_loaded").is_some() {
        println!("Demo data already loaded.");
        return Ok(());
    }

    for doc in DEMO_DOCTORS {
        conn.execute(
            "INSERT INTO doctors (code, name, commission_pct) VALUES (?1, ?2, ?3)",
            rusqlite::params![doc.code, doc.name, doc.commission_pct],
        )?;
    }

    // Daytime payroll slots plus one overnight on-call slot for M042.
    let slots: &[(&str, &str, &str, &str, bool)] = &[
        ("M042", "2025-03-10", "08:00", "14:00", true),
        ("M042", "2025-03-10", "22:00", "06:00", false),
        ("C108", "2025-03-10", "08:00", "13:00", true),
        ("C108", "2025-03-11", "14:00", "20:00", true),
    ];
    for (code, date, start, end, is_payroll) in slots {
        conn.execute(
            "INSERT INTO schedules (doctor_id, date, start_time, end_time, is_payroll) \
             SELECT id, ?2, ?3, ?4, ?5 FROM doctors WHERE code = ?1",
            rusqlite::params![code, date, start, end, is_payroll],
        )?;
    }

    // One general tariff where the clinic retains everything.
    conn.execute(
        "INSERT INTO tariffs (doctor_id, code, clinic_amount, doctor_amount) \
         VALUES (NULL, '20.30.40', 150.0, 0.0)",
        [],
    )?;

    let imports_dir = data_dir.join("imports");
    std::fs::create_dir_all(&imports_dir)?;
    let ledger_path = imports_dir.join("demo-ledger.csv");
    std::fs::write(&ledger_path, DEMO_LEDGER)?;

    let result = import_file(&conn, &settings, &ledger_path, Some("csv"))?;
    set_metadata(&conn, "demo_loaded", "1")?;

    println!(
        "Demo clinic loaded: {} doctors, {} schedule slots, ledger {} ({} services imported, {} excluded).",
        DEMO_DOCTORS.len(),
        slots.len(),
        ledger_path.display(),
        result.imported,
        result.excluded,
    );
    if result.flagged > 0 {
        println!(
            "{} services need review; try {}.",
            result.flagged,
            "reten review".bold()
        );
    }
    println!("Try: {}", "reten report commissions --month 2025-03".bold());
    Ok(())
}
