use thiserror::Error;

use crate::types::InstallmentKey;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Installment {0} not found")]
    NotFound(InstallmentKey),

    #[error("Installment {0} was already paid on {1}")]
    AlreadyPaid(InstallmentKey, chrono::NaiveDate),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TrackerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
