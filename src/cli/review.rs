use colored::Colorize;
use dialoguer::Input;

use crate::classifier::Classification;
use crate::db::get_connection;
use crate::error::{Result, RetenError};
use crate::fmt::money;
use crate::reviewer::{apply_review, get_flagged_services};
use crate::settings::{get_data_dir, load_settings};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let conn = get_connection(&get_data_dir().join("reten.db"))?;
    let flagged = get_flagged_services(&conn)?;

    if flagged.is_empty() {
        println!("{}", "No flagged services to review.".green());
        return Ok(());
    }

    println!("\n{} services to review\n", flagged.len());

    for svc in &flagged {
        println!("{}", "\u{2500}".repeat(60));
        println!("  Date:           {} {}", svc.date, svc.time);
        println!(
            "  Doctor:         {} ({})",
            svc.doctor_name.as_deref().unwrap_or("(unknown)"),
            svc.doctor_code
        );
        println!("  Patient:        {}", svc.patient.as_deref().unwrap_or(""));
        println!("  Payer:          {}", svc.company.as_deref().unwrap_or(""));
        println!("  Amount:         {}", money(svc.amount));
        println!(
            "  Classification: {} (commission {})",
            svc.classification.to_uppercase(),
            money(svc.commission)
        );
        if let Some(reason) = &svc.flag_reason {
            println!("  Flagged:        {}", reason.yellow());
        }
        println!();

        let choice: String = Input::new()
            .with_prompt("p=planilla, r=reten, k=keep, s=skip, q=quit")
            .interact_text()
            .unwrap_or_else(|_| "s".to_string());

        let classification = match choice.to_lowercase().as_str() {
            "q" => {
                println!("{}", "Review paused.".yellow());
                return Ok(());
            }
            "s" => continue,
            "p" => Classification::Planilla,
            "r" => Classification::Reten,
            "k" => Classification::from_str(&svc.classification)
                .unwrap_or(Classification::Reten),
            _ => {
                println!("{}", "Invalid choice, skipping.".red());
                continue;
            }
        };

        match apply_review(&conn, &settings, svc.id, classification) {
            Ok(()) => println!(
                "{}",
                format!("\u{2192} Set to {}", classification.as_str().to_uppercase()).green()
            ),
            Err(RetenError::UnknownDoctor(code)) => println!(
                "{}",
                format!(
                    "Doctor {code} is not registered; add them with `reten doctors add`, \
                     then run `reten recalc`."
                )
                .yellow()
            ),
            Err(e) => return Err(e),
        }
        println!();
    }

    println!("{}", "Review complete!".green());
    Ok(())
}
