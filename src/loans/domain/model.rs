use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::core::domain::Identifiable;
use crate::core::library::LoanStatus;
use crate::utils::date::{opt_serializer, serializer};

// LoanEntity abstracts one borrow-to-return cycle of an item by a borrower.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct LoanEntity {
    pub loan_id: String,
    pub version: i64,
    pub branch_id: String,
    pub item_id: String,
    pub borrower_id: String,
    // reservation that authorized this loan, if any
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

impl LoanEntity {
    pub fn new(branch_id: &str, item_id: &str, borrower_id: &str,
               borrowed_at: NaiveDateTime, due_at: NaiveDateTime, now: NaiveDateTime) -> Self {
        Self {
            loan_id: Uuid::new_v4().to_string(),
            version: 0,
            branch_id: branch_id.to_string(),
            item_id: item_id.to_string(),
            borrower_id: borrower_id.to_string(),
            reservation_id: None,
            loan_status: LoanStatus::Borrowed,
            borrowed_at,
            due_at,
            returned_at: None,
            overdue_days: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        self.returned_at.is_none() && self.loan_status.is_open()
    }
}

impl Identifiable for LoanEntity {
    fn id(&self) -> String {
        self.loan_id.to_string()
    }

    fn version(&self) -> i64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};
    use crate::core::library::LoanStatus;
    use crate::loans::domain::model::LoanEntity;

    #[tokio::test]
    async fn test_should_build_loan() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let loan = LoanEntity::new("main", "item1", "patron1", now, now + Duration::days(14), now);
        assert_eq!("item1", loan.item_id.as_str());
        assert_eq!("patron1", loan.borrower_id.as_str());
        assert_eq!(LoanStatus::Borrowed, loan.loan_status);
        assert!(loan.is_open());
    }

    #[tokio::test]
    async fn test_should_serialize_loan() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let mut loan = LoanEntity::new("main", "item1", "patron1", now, now + Duration::days(14), now);
        loan.returned_at = Some(now + Duration::days(3));
        let json = serde_json::to_value(&loan).expect("serialize");
        let parsed: LoanEntity = serde_json::from_value(json).expect("deserialize");
        assert_eq!(loan, parsed);
    }
}
