use std::path::PathBuf;

use crate::db::get_connection;
use crate::error::Result;
use crate::importer::import_file;
use crate::settings::{get_data_dir, load_settings};

pub fn run(file: &str, format: Option<&str>) -> Result<()> {
    let file_path = PathBuf::from(file);
    let settings = load_settings();
    let conn = get_connection(&get_data_dir().join("reten.db"))?;

    let result = import_file(&conn, &settings, &file_path, format)?;

    if result.duplicate_file {
        println!("This file has already been imported (duplicate checksum).");
        return Ok(());
    }

    println!(
        "{} imported, {} skipped (duplicates), {} excluded (noise), {} malformed",
        result.imported, result.skipped, result.excluded, result.malformed
    );
    if result.flagged > 0 {
        println!("{} flagged for review (`reten review`)", result.flagged);
    }

    Ok(())
}
