//! Error types for Draftboard Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Transaction failed: {0}")]
    TransactionFailure(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Player {0} is already drafted")]
    PlayerAlreadyDrafted(i64),

    #[error("Slot not found: {0}")]
    SlotNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the client may simply re-issue the same intent
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransactionFailure(_) | Error::Database(_))
    }

    /// Message shown to the session that issued the failing intent
    pub fn client_message(&self) -> String {
        match self {
            Error::InvalidPayload(detail) => format!("Invalid request: {}", detail),
            Error::PlayerAlreadyDrafted(_) => {
                "That player has already been drafted. Clear their slot first.".to_string()
            }
            Error::SlotNotFound(slot) => format!("Unknown draft slot: {}", slot),
            Error::NotFound(what) => format!("Not found: {}", what),
            Error::Unauthorized(_) => "Authentication required.".to_string(),
            Error::TransactionFailure(_) | Error::Database(_) => {
                "Failed to update the draft board. Please try again.".to_string()
            }
            Error::Io(_) | Error::Serialization(_) => "Internal server error.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_failures_are_retryable() {
        assert!(Error::TransactionFailure("boom".into()).is_retryable());
        assert!(!Error::InvalidPayload("missing id".into()).is_retryable());
        assert!(!Error::PlayerAlreadyDrafted(7).is_retryable());
    }
}
