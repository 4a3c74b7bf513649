use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::core::domain::Identifiable;
use crate::core::library::LoanStatus;
use crate::loans::domain::model::LoanEntity;
use crate::utils::date::{opt_serializer, serializer};

// LoanDto abstracts a loan record handed to callers.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct LoanDto {
    pub loan_id: String,
    pub version: i64,
    pub branch_id: String,
    pub item_id: String,
    pub borrower_id: String,
    pub reservation_id: Option<String>,
    pub loan_status: LoanStatus,
    #[serde(with = "serializer")]
    pub borrowed_at: NaiveDateTime,
    #[serde(with = "serializer")]
    pub due_at: NaiveDateTime,
    #[serde(with = "opt_serializer", default)]
    pub returned_at: Option<NaiveDateTime>,
    pub overdue_days: i64,
    #[serde(with = "serializer")]
    pub created_at: NaiveDateTime,
    #[serde(with = "serializer")]
    pub updated_at: NaiveDateTime,
}

impl Identifiable for LoanDto {
    fn id(&self) -> String {
        self.loan_id.to_string()
    }

    fn version(&self) -> i64 {
        self.version
    }
}

impl From<&LoanEntity> for LoanDto {
    fn from(other: &LoanEntity) -> LoanDto {
        LoanDto {
            loan_id: other.loan_id.to_string(),
            version: other.version,
            branch_id: other.branch_id.to_string(),
            item_id: other.item_id.to_string(),
            borrower_id: other.borrower_id.to_string(),
            reservation_id: other.reservation_id.clone(),
            loan_status: other.loan_status,
            borrowed_at: other.borrowed_at,
            due_at: other.due_at,
            returned_at: other.returned_at,
            overdue_days: other.overdue_days,
            created_at: other.created_at,
            updated_at: other.updated_at,
        }
    }
}

impl From<&LoanDto> for LoanEntity {
    fn from(other: &LoanDto) -> LoanEntity {
        LoanEntity {
            loan_id: other.loan_id.to_string(),
            version: other.version,
            branch_id: other.branch_id.to_string(),
            item_id: other.item_id.to_string(),
            borrower_id: other.borrower_id.to_string(),
            reservation_id: other.reservation_id.clone(),
            loan_status: other.loan_status,
            borrowed_at: other.borrowed_at,
            due_at: other.due_at,
            returned_at: other.returned_at,
            overdue_days: other.overdue_days,
            created_at: other.created_at,
            updated_at: other.updated_at,
        }
    }
}
