pub mod approve;
pub mod backup;
pub mod demo;
pub mod doctors;
pub mod import;
pub mod init;
pub mod recalc;
pub mod report;
pub mod review;
pub mod schedule;
pub mod status;
pub mod tariffs;

use clap::{Parser, Subcommand};

use crate::error::{Result, RetenError};

pub(crate) fn parse_month_opt(month: &Option<String>) -> Result<(Option<i32>, Option<u32>)> {
    let Some(m) = month else {
        return Ok((None, None));
    };
    let parts: Vec<&str> = m.split('-').collect();
    if parts.len() == 2 && parts[0].len() == 4 {
        if let (Ok(year), Ok(month)) = (parts[0].parse::<i32>(), parts[1].parse::<u32>()) {
            if (1..=12).contains(&month) {
                return Ok((Some(year), Some(month)));
            }
        }
    }
    Err(RetenError::Other(format!(
        "Invalid month '{m}' (expected YYYY-MM)"
    )))
}

#[derive(Parser)]
#[command(name = "reten", about = "Doctor commission reconciliation CLI for small clinics.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up reten: choose a data directory and initialize the database.
    Init {
        /// Path for reten data (default: ~/Documents/reten)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Clinic name shown on report headers
        #[arg(long = "clinic-name")]
        clinic_name: Option<String>,
    },
    /// Manage doctors.
    Doctors {
        #[command(subcommand)]
        command: DoctorsCommands,
    },
    /// Manage doctor schedule slots.
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommands,
    },
    /// Manage fee-schedule tariffs.
    Tariffs {
        #[command(subcommand)]
        command: TariffsCommands,
    },
    /// Import a billed-services ledger (XLSX or CSV), classify and price it.
    Import {
        /// Path to the ledger file
        file: String,
        /// Format key (xlsx, csv); default: by extension
        #[arg(long)]
        format: Option<String>,
    },
    /// Re-run classification and commission pricing on pending services.
    Recalc,
    /// Interactively review flagged services.
    Review,
    /// Bulk-approve a month of classified services.
    Approve {
        /// Month: YYYY-MM
        #[arg(long)]
        month: String,
        /// Restrict to one doctor code
        #[arg(long)]
        doctor: Option<String>,
    },
    /// Generate reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Load a sample clinic and ledger to explore reten.
    Demo,
    /// Back up the database.
    Backup {
        /// Output path (default: <data_dir>/backups/reten-YYYYMMDD-HHMMSS.db)
        #[arg(long)]
        output: Option<String>,
    },
    /// Show current database and summary statistics.
    Status,
}

#[derive(Subcommand)]
pub enum DoctorsCommands {
    /// Add a doctor.
    Add {
        /// Doctor code as it appears in the ledger (cod_seri)
        code: String,
        /// Doctor name
        name: String,
        /// Standard commission percentage
        #[arg(long)]
        commission: Option<f64>,
        /// Insurer on-call percentage (default 92.5 when unset)
        #[arg(long = "insurance-commission")]
        insurance_commission: Option<f64>,
    },
    /// List all doctors.
    List,
}

#[derive(Subcommand)]
pub enum ScheduleCommands {
    /// Add a schedule slot for a doctor.
    Add {
        /// Doctor code
        doctor: String,
        /// Date: YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// Start time: HH:MM
        #[arg(long)]
        start: String,
        /// End time: HH:MM (before start = overnight shift)
        #[arg(long)]
        end: String,
        /// Mark as an on-call (non-payroll) slot
        #[arg(long = "on-call")]
        on_call: bool,
    },
    /// List schedule slots, optionally for one date.
    List {
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum TariffsCommands {
    /// Add a tariff entry.
    Add {
        /// Service code (cod_seg)
        code: String,
        /// Doctor code for a doctor-specific tariff; omit for general
        #[arg(long)]
        doctor: Option<String>,
        /// Clinic amount
        #[arg(long)]
        clinic: f64,
        /// Doctor amount
        #[arg(long = "doctor-amount")]
        doctor_amount: f64,
    },
    /// List tariffs.
    List,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Commission summary per doctor.
    Commissions {
        /// Month filter: YYYY-MM
        #[arg(long)]
        month: Option<String>,
        /// Year filter: YYYY
        #[arg(long)]
        year: Option<i32>,
    },
    /// PLANILLA/RETEN breakdown.
    Breakdown {
        #[arg(long)]
        month: Option<String>,
        #[arg(long)]
        year: Option<i32>,
    },
    /// Show all flagged services awaiting review.
    Flagged,
    /// Import history.
    Imports,
}
