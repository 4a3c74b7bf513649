use std::fmt;
use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub enum LibraryError {
    Database {
        message: String,
        reason_code: Option<String>,
        retryable: bool,
    },
    // A storage-level uniqueness constraint rejected the write, e.g. a second open
    // loan or a second active reservation for the same item.
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
    // The version presented with a write no longer matches the stored version.
    // This is the only circulation error that is safe to retry after re-reading.
    ConcurrencyConflict {
        message: String,
    },
    Expired {
        message: String,
    },
    InvalidDate {
        message: String,
    },
    Validation {
        message: String,
        reason_code: Option<String>,
    },
    Serialization {
        message: String,
    },
    Runtime {
        message: String,
        reason_code: Option<String>,
    },
}

impl LibraryError {
    pub fn database(message: &str, reason_code: Option<String>, retryable: bool) -> LibraryError {
        LibraryError::Database { message: message.to_string(), reason_code, retryable }
    }

    pub fn duplicate_key(message: &str) -> LibraryError {
        LibraryError::DuplicateKey { message: message.to_string() }
    }

    pub fn not_found(message: &str) -> LibraryError {
        LibraryError::NotFound { message: message.to_string() }
    }

    pub fn invalid_state(message: &str) -> LibraryError {
        LibraryError::InvalidState { message: message.to_string() }
    }

    pub fn item_unavailable(message: &str) -> LibraryError {
        LibraryError::ItemUnavailable { message: message.to_string() }
    }

    pub fn item_currently_available(message: &str) -> LibraryError {
        LibraryError::ItemCurrentlyAvailable { message: message.to_string() }
    }

    pub fn duplicate_active_reservation(message: &str) -> LibraryError {
        LibraryError::DuplicateActiveReservation { message: message.to_string() }
    }

    pub fn already_borrowing(message: &str) -> LibraryError {
        LibraryError::AlreadyBorrowing { message: message.to_string() }
    }

    pub fn insufficient_stock(message: &str) -> LibraryError {
        LibraryError::InsufficientStock { message: message.to_string() }
    }

    pub fn concurrency_conflict(message: &str) -> LibraryError {
        LibraryError::ConcurrencyConflict { message: message.to_string() }
    }

    pub fn expired(message: &str) -> LibraryError {
        LibraryError::Expired { message: message.to_string() }
    }

    pub fn invalid_date(message: &str) -> LibraryError {
        LibraryError::InvalidDate { message: message.to_string() }
    }

    pub fn database_or_unavailable(message: &str, reason: Option<String>, retryable: bool) -> LibraryError {
        if let Some(ref reason_val) = reason {
            if reason_val.as_str().contains("404") {
                return LibraryError::not_found(
                    format!("not found error {:?} {:?}", message, reason).as_str());
            }
        }
        LibraryError::database(
            format!("ddb database error {:?} {:?}", message, reason).as_str(), reason, retryable)
    }

    pub fn validation(message: &str, reason_code: Option<String>) -> LibraryError {
        LibraryError::Validation { message: message.to_string(), reason_code }
    }

    pub fn serialization(message: &str) -> LibraryError {
        LibraryError::Serialization { message: message.to_string() }
    }

    pub fn runtime(message: &str, reason_code: Option<String>) -> LibraryError {
        LibraryError::Runtime { message: message.to_string(), reason_code }
    }

    pub fn retryable(&self) -> bool {
        match self {
            LibraryError::Database { retryable, .. } => { *retryable }
            LibraryError::ConcurrencyConflict { .. } => { true }
            _ => { false }
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, LibraryError::ConcurrencyConflict { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            LibraryError::Database { message, .. } => message,
            LibraryError::DuplicateKey { message } => message,
            LibraryError::NotFound { message } => message,
            LibraryError::InvalidState { message } => message,
            LibraryError::ItemUnavailable { message } => message,
            LibraryError::ItemCurrentlyAvailable { message } => message,
            LibraryError::DuplicateActiveReservation { message } => message,
            LibraryError::AlreadyBorrowing { message } => message,
            LibraryError::InsufficientStock { message } => message,
            LibraryError::ConcurrencyConflict { message } => message,
            LibraryError::Expired { message } => message,
            LibraryError::InvalidDate { message } => message,
            LibraryError::Validation { message, .. } => message,
            LibraryError::Serialization { message } => message,
            LibraryError::Runtime { message, .. } => message,
        }
    }
}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::runtime(
            format!("serde io {:?}", err).as_str(), None)
    }
}

impl From<serde_json::Error> for LibraryError {
    fn from(err: serde_json::Error) -> Self {
        LibraryError::serialization(
            format!("serde json parsing {:?}", err).as_str())
    }
}

impl From<String> for LibraryError {
    fn from(err: String) -> Self {
        LibraryError::serialization(
            format!("serde parsing {:?}", err).as_str())
    }
}

impl Display for LibraryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LibraryError::Database { message, reason_code, retryable } => {
                write!(f, "{} {:?} {}", message, reason_code, retryable)
            }
            LibraryError::Validation { message, reason_code } => {
                write!(f, "{} {:?}", message, reason_code)
            }
            LibraryError::Runtime { message, reason_code } => {
                write!(f, "{} {:?}", message, reason_code)
            }
            other => {
                write!(f, "{}", other.message())
            }
        }
    }
}

impl std::error::Error for LibraryError {}

/// A specialized Result type for circulation operations.
pub type LibraryResult<T> = Result<T, LibraryError>;

// It defines abstraction for paginated result
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResult<T> {
    // The page number or token
    pub page: Option<String>,
    // page size
    pub page_size: usize,
    // Next page if available
    pub next_page: Option<String>,
    // list of records
    pub records: Vec<T>,
}

pub const MAX_PAGE_SIZE: usize = 500;

// Bounds a caller supplied page size to 1..=MAX_PAGE_SIZE.
pub fn bounded_page_size(page_size: usize) -> usize {
    page_size.clamp(1, MAX_PAGE_SIZE)
}

impl<T> PaginatedResult<T> {
    pub fn new(page: Option<&str>, page_size: usize,
               next_page: Option<String>, records: Vec<T>) -> Self {
        PaginatedResult {
            page: page.map(str::to_string),
            page_size,
            next_page,
            records,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum LoanStatus {
    Borrowed,
    Returned,
    // returned after the due date
    Overdue,
}

impl LoanStatus {
    pub fn is_open(&self) -> bool {
        *self == LoanStatus::Borrowed
    }
}

impl From<String> for LoanStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Borrowed" => LoanStatus::Borrowed,
            "Returned" => LoanStatus::Returned,
            "Overdue" => LoanStatus::Overdue,
            _ => LoanStatus::Borrowed,
        }
    }
}

impl Display for LoanStatus {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            LoanStatus::Borrowed => write!(f, "Borrowed"),
            LoanStatus::Returned => write!(f, "Returned"),
            LoanStatus::Overdue => write!(f, "Overdue"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum ReservationStatus {
    Reserved,
    Wait,
    Cancelled,
    Expired,
    Complete,
}

impl ReservationStatus {
    // Reserved and Wait occupy the item's single reservation slot.
    pub fn holds_slot(&self) -> bool {
        matches!(self, ReservationStatus::Reserved | ReservationStatus::Wait)
    }

    pub fn is_terminal(&self) -> bool {
        !self.holds_slot()
    }
}

impl From<String> for ReservationStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Reserved" => ReservationStatus::Reserved,
            "Wait" => ReservationStatus::Wait,
            "Cancelled" => ReservationStatus::Cancelled,
            "Expired" => ReservationStatus::Expired,
            "Complete" => ReservationStatus::Complete,
            _ => ReservationStatus::Reserved,
        }
    }
}

impl Display for ReservationStatus {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ReservationStatus::Reserved => write!(f, "Reserved"),
            ReservationStatus::Wait => write!(f, "Wait"),
            ReservationStatus::Cancelled => write!(f, "Cancelled"),
            ReservationStatus::Expired => write!(f, "Expired"),
            ReservationStatus::Complete => write!(f, "Complete"),
        }
    }
}
