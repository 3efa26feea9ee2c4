use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use rusqlite::backup::Backup;
use rusqlite::Connection;

use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::get_data_dir;

pub fn run(output: Option<String>) -> Result<()> {
    let data_dir = get_data_dir();
    let src = get_connection(&data_dir.join("reten.db"))?;

    let dest_path = match output {
        Some(p) => PathBuf::from(p),
        None => {
            let stamp = Local::now().format("%Y%m%d-%H%M%S");
            data_dir.join("backups").join(format!("reten-{stamp}.db"))
        }
    };
    if let Some(parent) = dest_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut dest = Connection::open(&dest_path)?;
    let backup = Backup::new(&src, &mut dest)?;
    backup.run_to_completion(64, Duration::from_millis(100), None)?;
    drop(backup);
    drop(dest);

    let size = std::fs::metadata(&dest_path).map(|m| m.len()).unwrap_or(0);
    println!("Backed up to {} ({})", dest_path.display(), format_bytes(size));
    Ok(())
}
