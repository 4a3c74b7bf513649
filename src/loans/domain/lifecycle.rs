use chrono::{Duration, NaiveDateTime};
use crate::core::domain::Configuration;
use crate::core::library::{LibraryError, LibraryResult, LoanStatus};
use crate::items::domain::Item;
use crate::items::domain::model::ItemEntity;
use crate::loans::domain::model::LoanEntity;

// BorrowLifecycle is the state machine of a single loan: Borrowed -> Returned, or
// Borrowed -> Overdue when it comes back after the due date. Overdue of an open loan
// is derived from the due date, never stored.
#[derive(Debug, Clone)]
pub struct BorrowLifecycle {
    branch_id: String,
    loan_period: Duration,
}

impl BorrowLifecycle {
    pub fn new(config: &Configuration) -> Self {
        Self {
            branch_id: config.branch_id.to_string(),
            loan_period: config.loan_period(),
        }
    }

    // Issues a loan dated `as_of` and takes the item's open-loan slot. A held item can only
    // be issued to the reservation it is held for.
    pub fn issue_loan(&self, item: &mut ItemEntity, borrower_id: &str, authorized_by: Option<&str>,
                      as_of: NaiveDateTime, now: NaiveDateTime) -> LibraryResult<LoanEntity> {
        let held_for_caller = item.held_for.is_some() && item.held_for.as_deref() == authorized_by;
        if !item.borrowable || item.is_on_loan() || (item.is_held() && !held_for_caller) {
            return Err(LibraryError::item_unavailable(
                format!("item {} is not available for borrowing", item.item_id).as_str()));
        }
        if as_of.date() < now.date() {
            return Err(LibraryError::invalid_date(
                format!("loan date {} is earlier than today {}", as_of.date(), now.date()).as_str()));
        }
        let mut loan = LoanEntity::new(self.branch_id.as_str(), item.item_id.as_str(), borrower_id,
                                       as_of, as_of + self.loan_period, now);
        loan.reservation_id = authorized_by.map(str::to_string);
        item.open_loan_id = Some(loan.loan_id.to_string());
        if held_for_caller {
            item.held_for = None;
        }
        item.updated_at = now;
        Ok(loan)
    }

    // Closes an open loan and frees the item's loan slot. Returns the whole days it came
    // back late. Availability is left to the caller, which first decides whether a
    // reservation claims the item.
    pub fn close_loan(&self, loan: &mut LoanEntity, item: &mut ItemEntity, return_at: NaiveDateTime) -> LibraryResult<i64> {
        if loan.loan_status != LoanStatus::Borrowed {
            return Err(LibraryError::invalid_state(
                format!("loan {} is {} and cannot be returned", loan.loan_id, loan.loan_status).as_str()));
        }
        let overdue_days = overdue_days(loan, return_at);
        loan.returned_at = Some(return_at);
        loan.overdue_days = overdue_days;
        loan.loan_status = if overdue_days > 0 { LoanStatus::Overdue } else { LoanStatus::Returned };
        loan.updated_at = return_at;
        if item.open_loan_id.as_deref() == Some(loan.loan_id.as_str()) {
            item.open_loan_id = None;
        }
        item.updated_at = return_at;
        Ok(overdue_days)
    }
}

pub fn overdue_days(loan: &LoanEntity, at: NaiveDateTime) -> i64 {
    (at.date() - loan.due_at.date()).num_days().max(0)
}

pub fn is_overdue(loan: &LoanEntity, today: NaiveDateTime) -> bool {
    loan.loan_status == LoanStatus::Borrowed && today.date() > loan.due_at.date()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use crate::core::domain::Configuration;
    use crate::core::library::{LibraryError, LoanStatus};
    use crate::items::domain::Item;
    use crate::items::domain::model::ItemEntity;
    use crate::loans::domain::lifecycle::{is_overdue, BorrowLifecycle};

    fn day(n: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap() + Duration::days(n)
    }

    fn lifecycle() -> BorrowLifecycle {
        BorrowLifecycle::new(&Configuration::new("test"))
    }

    #[tokio::test]
    async fn test_should_issue_loan_with_due_date() {
        let mut item = ItemEntity::new("42", "Dune", true, day(0));
        let loan = lifecycle().issue_loan(&mut item, "7", None, day(0), day(0)).expect("should issue");
        assert_eq!(LoanStatus::Borrowed, loan.loan_status);
        assert_eq!(day(14), loan.due_at);
        assert_eq!(Some(loan.loan_id.clone()), item.open_loan_id);
        assert!(!item.is_available());
    }

    #[tokio::test]
    async fn test_should_not_issue_unavailable_item() {
        let mut item = ItemEntity::new("42", "Dune", true, day(0));
        let _ = lifecycle().issue_loan(&mut item, "7", None, day(0), day(0)).expect("should issue");
        let res = lifecycle().issue_loan(&mut item, "9", None, day(1), day(1));
        assert!(matches!(res, Err(LibraryError::ItemUnavailable { .. })));

        let mut withdrawn = ItemEntity::new("43", "Emma", false, day(0));
        let res = lifecycle().issue_loan(&mut withdrawn, "9", None, day(1), day(1));
        assert!(matches!(res, Err(LibraryError::ItemUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_should_reject_back_dated_loan() {
        let mut item = ItemEntity::new("42", "Dune", true, day(0));
        let res = lifecycle().issue_loan(&mut item, "7", None, day(-1), day(0));
        assert!(matches!(res, Err(LibraryError::InvalidDate { .. })));
        assert!(item.is_available());
    }

    #[tokio::test]
    async fn test_should_issue_held_item_only_to_its_hold() {
        let mut item = ItemEntity::new("42", "Dune", true, day(0));
        item.held_for = Some("r1".to_string());
        let res = lifecycle().issue_loan(&mut item, "7", None, day(1), day(1));
        assert!(matches!(res, Err(LibraryError::ItemUnavailable { .. })));
        let res = lifecycle().issue_loan(&mut item, "7", Some("r2"), day(1), day(1));
        assert!(matches!(res, Err(LibraryError::ItemUnavailable { .. })));

        let loan = lifecycle().issue_loan(&mut item, "9", Some("r1"), day(1), day(1)).expect("should issue");
        assert_eq!(Some("r1".to_string()), loan.reservation_id);
        assert_eq!(None, item.held_for);
    }

    #[tokio::test]
    async fn test_should_close_loan_on_time() {
        let mut item = ItemEntity::new("42", "Dune", true, day(0));
        let mut loan = lifecycle().issue_loan(&mut item, "7", None, day(0), day(0)).expect("should issue");
        let overdue = lifecycle().close_loan(&mut loan, &mut item, day(14)).expect("should close");
        assert_eq!(0, overdue);
        assert_eq!(LoanStatus::Returned, loan.loan_status);
        assert_eq!(Some(day(14)), loan.returned_at);
        assert_eq!(None, item.open_loan_id);
    }

    #[tokio::test]
    async fn test_should_close_late_loan_as_overdue() {
        let mut item = ItemEntity::new("42", "Dune", true, day(0));
        let mut loan = lifecycle().issue_loan(&mut item, "7", None, day(0), day(0)).expect("should issue");
        assert!(!is_overdue(&loan, day(14)));
        assert!(is_overdue(&loan, day(15)));
        let overdue = lifecycle().close_loan(&mut loan, &mut item, day(17)).expect("should close");
        assert_eq!(3, overdue);
        assert_eq!(LoanStatus::Overdue, loan.loan_status);
        assert!(!is_overdue(&loan, day(20)));
    }

    #[tokio::test]
    async fn test_should_not_close_twice() {
        let mut item = ItemEntity::new("42", "Dune", true, day(0));
        let mut loan = lifecycle().issue_loan(&mut item, "7", None, day(0), day(0)).expect("should issue");
        let _ = lifecycle().close_loan(&mut loan, &mut item, day(3)).expect("should close");
        let res = lifecycle().close_loan(&mut loan, &mut item, day(4));
        assert!(matches!(res, Err(LibraryError::InvalidState { .. })));
    }
}
