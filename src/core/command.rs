use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use crate::core::library::LibraryError;

// CommandError keeps every circulation error distinct so the calling layer can
// translate each one into its own message.
#[derive(Debug, PartialEq)]
pub enum CommandError {
    Database {
        message: String,
        reason_code: Option<String>,
        retryable: bool,
    },
    DuplicateKey {
        message: String,
    },
    NotFound {
        message: String,
    },
    InvalidState {
        message: String,
    },
    ItemUnavailable {
        message: String,
    },
    ItemCurrentlyAvailable {
        message: String,
    },
    DuplicateActiveReservation {
        message: String,
    },
    AlreadyBorrowing {
        message: String,
    },
    InsufficientStock {
        message: String,
    },
    ConcurrencyConflict {
        message: String,
    },
    Expired {
        message: String,
    },
    InvalidDate {
        message: String,
    },
    Runtime {
        message: String,
        reason_code: Option<String>,
        retryable: bool,
    },
    Serialization {
        message: String,
    },
    Validation {
        message: String,
        reason_code: Option<String>,
    },
}

#[async_trait]
pub trait Command<Request, Response> {
    async fn execute(&self, req: Request) -> Result<Response, CommandError>;
}

// requests may pin the clock, otherwise they run at the current UTC time
pub fn request_time(now: Option<NaiveDateTime>) -> NaiveDateTime {
    now.unwrap_or_else(|| Utc::now().naive_utc())
}

impl From<LibraryError> for CommandError {
    fn from(other: LibraryError) -> Self {
        match other {
            LibraryError::Database { message, reason_code, retryable } => {
                CommandError::Database { message, reason_code, retryable }
            }
            LibraryError::DuplicateKey { message } => {
                CommandError::DuplicateKey { message }
            }
            LibraryError::NotFound { message } => {
                CommandError::NotFound { message }
            }
            LibraryError::InvalidState { message } => {
                CommandError::InvalidState { message }
            }
            LibraryError::ItemUnavailable { message } => {
                CommandError::ItemUnavailable { message }
            }
            LibraryError::ItemCurrentlyAvailable { message } => {
                CommandError::ItemCurrentlyAvailable { message }
            }
            LibraryError::DuplicateActiveReservation { message } => {
                CommandError::DuplicateActiveReservation { message }
            }
            LibraryError::AlreadyBorrowing { message } => {
                CommandError::AlreadyBorrowing { message }
            }
            LibraryError::InsufficientStock { message } => {
                CommandError::InsufficientStock { message }
            }
            LibraryError::ConcurrencyConflict { message } => {
                CommandError::ConcurrencyConflict { message }
            }
            LibraryError::Expired { message } => {
                CommandError::Expired { message }
            }
            LibraryError::InvalidDate { message } => {
                CommandError::InvalidDate { message }
            }
            LibraryError::Validation { message, reason_code } => {
                CommandError::Validation { message, reason_code }
            }
            LibraryError::Serialization { message } => {
                CommandError::Serialization { message }
            }
            LibraryError::Runtime { message, reason_code } => {
                CommandError::Runtime { message, reason_code, retryable: false }
            }
        }
    }
}
