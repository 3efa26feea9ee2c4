use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetenError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Xlsx(String),

    #[error("Unknown doctor: {0}")]
    UnknownDoctor(String),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, RetenError>;
