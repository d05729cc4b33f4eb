use std::path::PathBuf;

use monitoring::AppError;
use thiserror::Error;

/// Failure of a single credentials line or CSV row. The batch continues.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Malformed line: {0}")]
    MalformedLine(String),
    #[error("Invalid timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        source: time::error::Parse,
    },
    #[error("Invalid value {value:?}: {source}")]
    Number {
        value: String,
        source: std::num::ParseFloatError,
    },
    #[error("Store error: {0}")]
    Store(#[from] AppError),
}

/// Failure that stops a whole command.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
