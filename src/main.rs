mod approval;
mod classifier;
mod cli;
mod commission;
mod db;
mod error;
mod fmt;
mod importer;
mod models;
mod parser;
mod reports;
mod reviewer;
mod settings;

use clap::Parser;

use cli::{Cli, Commands, DoctorsCommands, ReportCommands, ScheduleCommands, TariffsCommands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init {
            data_dir,
            clinic_name,
        } => cli::init::run(data_dir, clinic_name),
        Commands::Doctors { command } => match command {
            DoctorsCommands::Add {
                code,
                name,
                commission,
                insurance_commission,
            } => cli::doctors::add(&code, &name, commission, insurance_commission),
            DoctorsCommands::List => cli::doctors::list(),
        },
        Commands::Schedule { command } => match command {
            ScheduleCommands::Add {
                doctor,
                date,
                start,
                end,
                on_call,
            } => cli::schedule::add(&doctor, &date, &start, &end, on_call),
            ScheduleCommands::List { date } => cli::schedule::list(date.as_deref()),
        },
        Commands::Tariffs { command } => match command {
            TariffsCommands::Add {
                code,
                doctor,
                clinic,
                doctor_amount,
            } => cli::tariffs::add(&code, doctor.as_deref(), clinic, doctor_amount),
            TariffsCommands::List => cli::tariffs::list(),
        },
        Commands::Import { file, format } => cli::import::run(&file, format.as_deref()),
        Commands::Recalc => cli::recalc::run(),
        Commands::Review => cli::review::run(),
        Commands::Approve { month, doctor } => cli::approve::run(&month, doctor.as_deref()),
        Commands::Report { command } => match command {
            ReportCommands::Commissions { month, year } => cli::report::commissions(month, year),
            ReportCommands::Breakdown { month, year } => cli::report::breakdown(month, year),
            ReportCommands::Flagged => cli::report::flagged(),
            ReportCommands::Imports => cli::report::imports(),
        },
        Commands::Demo => cli::demo::run(),
        Commands::Backup { output } => cli::backup::run(output),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
