//! Error types shared by the persisted stores and validators.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Error, Debug)]
pub enum BotError {
    /// Callsign does not look like an amateur callsign
    #[error("Invalid callsign '{0}'")]
    InvalidCallsign(String),

    #[error("Invalid time '{0}', expected HH:MM (UTC)")]
    InvalidTime(String),

    #[error("Invalid day of week {0}, expected 0 (Monday) to 6 (Sunday)")]
    InvalidDayOfWeek(i64),

    #[error("Invalid enabled value '{0}', expected true/false or 0/1")]
    InvalidEnabled(String),

    /// Rich content must be a JSON array of card objects
    #[error("Invalid rich content: {0}")]
    InvalidRichContent(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BotError {
    /// Rejected input, as opposed to a storage failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BotError::InvalidCallsign(_)
                | BotError::InvalidTime(_)
                | BotError::InvalidDayOfWeek(_)
                | BotError::InvalidEnabled(_)
                | BotError::InvalidRichContent(_)
        )
    }
}
