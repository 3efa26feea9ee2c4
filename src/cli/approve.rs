use colored::Colorize;

use crate::approval::approve_month;
use crate::db::get_connection;
use crate::error::Result;
use crate::settings::get_data_dir;

pub fn run(month: &str, doctor: Option<&str>) -> Result<()> {
    let conn = get_connection(&get_data_dir().join("reten.db"))?;
    let result = approve_month(&conn, month, doctor)?;

    println!(
        "{} approved, {} skipped (flagged), {} already approved",
        result.approved, result.skipped_flagged, result.already_approved
    );
    if result.skipped_flagged > 0 {
        println!(
            "{}",
            "Flagged services need review before approval (`reten review`).".yellow()
        );
    }
    Ok(())
}
