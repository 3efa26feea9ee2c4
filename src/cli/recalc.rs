use crate::db::get_connection;
use crate::error::Result;
use crate::importer::recalculate_pending;
use crate::settings::{get_data_dir, load_settings};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let conn = get_connection(&get_data_dir().join("reten.db"))?;
    let result = recalculate_pending(&conn, &settings)?;
    println!(
        "{} recalculated, {} still flagged",
        result.recalculated, result.still_flagged
    );
    Ok(())
}
