use std::path::PathBuf;

use crate::db::{get_connection, init_db, set_metadata};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path, Settings};

pub fn run(data_dir: Option<String>, clinic_name: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    let defaults = Settings::default();

    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    } else if settings.data_dir == defaults.data_dir {
        // First run: prompt for data dir
        let default = settings.data_dir.clone();
        let chosen: String = dialoguer::Input::new()
            .with_prompt("Data directory")
            .default(default)
            .interact_text()
            .unwrap_or_else(|_| settings.data_dir.clone());
        if !chosen.trim().is_empty() {
            settings.data_dir = shellexpand_path(chosen.trim());
        }
    }

    save_settings(&settings)?;

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;
    std::fs::create_dir_all(resolved.join("imports"))?;
    std::fs::create_dir_all(resolved.join("backups"))?;

    let conn = get_connection(&resolved.join("reten.db"))?;
    init_db(&conn)?;
    if let Some(name) = clinic_name {
        set_metadata(&conn, "clinic_name", &name)?;
    }

    println!("Initialized reten at {}", resolved.display());
    Ok(())
}
