use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::parse_month_opt;
use crate::db::{get_connection, get_metadata};
use crate::error::Result;
use crate::fmt::money;
use crate::reports;
use crate::reviewer::get_flagged_services;
use crate::settings::get_data_dir;

/// Prepend clinic name as a header line if set.
fn with_header(clinic_name: &str, body: String) -> String {
    if clinic_name.is_empty() {
        body
    } else {
        format!("{clinic_name}\n{body}")
    }
}

pub fn commissions(month: Option<String>, year: Option<i32>) -> Result<()> {
    let conn = get_connection(&get_data_dir().join("reten.db"))?;
    let clinic = get_metadata(&conn, "clinic_name").unwrap_or_default();
    let (my, mm) = parse_month_opt(&month)?;
    let data = reports::get_commission_summary(&conn, year.or(my), mm)?;
    println!("{}", with_header(&clinic, format_commissions(&data)));
    Ok(())
}

pub fn breakdown(month: Option<String>, year: Option<i32>) -> Result<()> {
    let conn = get_connection(&get_data_dir().join("reten.db"))?;
    let clinic = get_metadata(&conn, "clinic_name").unwrap_or_default();
    let (my, mm) = parse_month_opt(&month)?;
    let data = reports::get_breakdown(&conn, year.or(my), mm)?;
    println!("{}", with_header(&clinic, format_breakdown(&data)));
    Ok(())
}

pub fn flagged() -> Result<()> {
    let conn = get_connection(&get_data_dir().join("reten.db"))?;
    let clinic = get_metadata(&conn, "clinic_name").unwrap_or_default();
    let rows = get_flagged_services(&conn)?;
    println!("{}", with_header(&clinic, format_flagged(&rows)));
    Ok(())
}

pub fn imports() -> Result<()> {
    let conn = get_connection(&get_data_dir().join("reten.db"))?;
    let rows = reports::get_import_history(&conn)?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "File", "Imported at", "Records", "Excluded", "Date range"]);
    for row in rows {
        table.add_row(vec![
            Cell::new(row.id),
            Cell::new(row.filename),
            Cell::new(row.import_date),
            Cell::new(row.record_count),
            Cell::new(row.excluded_count),
            Cell::new(row.date_range),
        ]);
    }
    println!("Imports\n{table}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Pure formatting functions (report data -> String)
// ---------------------------------------------------------------------------

pub fn format_commissions(data: &reports::CommissionSummary) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Doctor", "Code", "Planilla", "Reten", "Services", "Commission"]);
    for d in &data.doctors {
        table.add_row(vec![
            Cell::new(&d.name),
            Cell::new(&d.code),
            Cell::new(money(d.planilla_amount)),
            Cell::new(money(d.reten_amount)),
            Cell::new(d.service_count),
            Cell::new(money(d.commission_total)),
        ]);
    }
    format!(
        "Commissions\n{table}\n{} {}",
        "Total:".bold(),
        money(data.total_commission)
    )
}

pub fn format_breakdown(items: &[reports::BreakdownItem]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Classification", "Services", "Billed", "Commission"]);
    for item in items {
        table.add_row(vec![
            Cell::new(item.classification.to_uppercase()),
            Cell::new(item.count),
            Cell::new(money(item.amount)),
            Cell::new(money(item.commission)),
        ]);
    }
    format!("Breakdown\n{table}")
}

pub fn format_flagged(rows: &[crate::reviewer::FlaggedService]) -> String {
    if rows.is_empty() {
        return "No flagged services.".to_string();
    }
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Time", "Doctor", "Payer", "Amount", "Class", "Reason"]);
    for svc in rows {
        table.add_row(vec![
            Cell::new(svc.id),
            Cell::new(&svc.date),
            Cell::new(&svc.time),
            Cell::new(&svc.doctor_code),
            Cell::new(svc.company.as_deref().unwrap_or("")),
            Cell::new(money(svc.amount)),
            Cell::new(svc.classification.to_uppercase()),
            Cell::new(svc.flag_reason.as_deref().unwrap_or("")),
        ]);
    }
    format!("Flagged services\n{table}")
}
