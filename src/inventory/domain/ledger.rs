use chrono::NaiveDateTime;
use crate::core::library::{LibraryError, LibraryResult};
use crate::inventory::domain::model::InventoryCounterEntity;

// InventoryLedger applies counter changes. Claim and release require the version the
// caller last read; available = on_hand - reserved never goes negative.
#[derive(Debug, Clone, Default)]
pub struct InventoryLedger {}

impl InventoryLedger {
    pub fn new() -> Self {
        Self {}
    }

    pub fn claim(&self, counter: &mut InventoryCounterEntity, expected_version: i64, now: NaiveDateTime) -> LibraryResult<()> {
        check_version(counter, expected_version)?;
        if counter.available() <= 0 {
            return Err(LibraryError::insufficient_stock(
                format!("no copies of {} available at {}", counter.item_id, counter.location_id).as_str()));
        }
        counter.reserved += 1;
        counter.updated_at = now;
        Ok(())
    }

    pub fn release(&self, counter: &mut InventoryCounterEntity, expected_version: i64, now: NaiveDateTime) -> LibraryResult<()> {
        check_version(counter, expected_version)?;
        if counter.reserved <= 0 {
            return Err(LibraryError::invalid_state(
                format!("no claimed copies of {} at {}", counter.item_id, counter.location_id).as_str()));
        }
        counter.reserved -= 1;
        counter.updated_at = now;
        Ok(())
    }

    pub fn adjust_on_hand(&self, counter: &mut InventoryCounterEntity, delta: i64, now: NaiveDateTime) -> LibraryResult<()> {
        let on_hand = counter.on_hand.checked_add(delta).ok_or_else(|| LibraryError::insufficient_stock(
            format!("cannot add {} copies of {} at {} to {}",
                    delta, counter.item_id, counter.location_id, counter.on_hand).as_str()))?;
        if on_hand < 0 || on_hand < counter.reserved {
            return Err(LibraryError::insufficient_stock(
                format!("cannot set {} copies of {} at {} with {} claimed",
                        on_hand, counter.item_id, counter.location_id, counter.reserved).as_str()));
        }
        counter.on_hand = on_hand;
        counter.updated_at = now;
        Ok(())
    }
}

fn check_version(counter: &InventoryCounterEntity, expected_version: i64) -> LibraryResult<()> {
    if counter.version != expected_version {
        return Err(LibraryError::concurrency_conflict(
            format!("counter {} is at version {}, not {}", counter.counter_id, counter.version, expected_version).as_str()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use crate::core::library::LibraryError;
    use crate::inventory::domain::ledger::InventoryLedger;
    use crate::inventory::domain::model::InventoryCounterEntity;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_should_claim_and_release() {
        let ledger = InventoryLedger::new();
        let mut counter = InventoryCounterEntity::new("42", "main", now());
        ledger.adjust_on_hand(&mut counter, 2, now()).expect("should stock");
        ledger.claim(&mut counter, 0, now()).expect("should claim");
        ledger.claim(&mut counter, 0, now()).expect("should claim");
        assert_eq!(0, counter.available());
        let res = ledger.claim(&mut counter, 0, now());
        assert!(matches!(res, Err(LibraryError::InsufficientStock { .. })));

        ledger.release(&mut counter, 0, now()).expect("should release");
        assert_eq!(1, counter.reserved);
        assert_eq!(1, counter.available());
    }

    #[tokio::test]
    async fn test_should_reject_stale_version() {
        let ledger = InventoryLedger::new();
        let mut counter = InventoryCounterEntity::new("42", "main", now());
        counter.on_hand = 1;
        counter.version = 3;
        let res = ledger.claim(&mut counter, 2, now());
        assert!(matches!(res, Err(LibraryError::ConcurrencyConflict { .. })));
        let res = ledger.release(&mut counter, 2, now());
        assert!(matches!(res, Err(LibraryError::ConcurrencyConflict { .. })));
        assert_eq!(0, counter.reserved);
    }

    #[tokio::test]
    async fn test_should_never_go_negative() {
        let ledger = InventoryLedger::new();
        let mut counter = InventoryCounterEntity::new("42", "main", now());
        let res = ledger.release(&mut counter, 0, now());
        assert!(matches!(res, Err(LibraryError::InvalidState { .. })));
        let res = ledger.adjust_on_hand(&mut counter, -1, now());
        assert!(matches!(res, Err(LibraryError::InsufficientStock { .. })));

        ledger.adjust_on_hand(&mut counter, 1, now()).expect("should stock");
        ledger.claim(&mut counter, 0, now()).expect("should claim");
        let res = ledger.adjust_on_hand(&mut counter, -1, now());
        assert!(matches!(res, Err(LibraryError::InsufficientStock { .. })));
        assert_eq!(1, counter.on_hand);

        let res = ledger.adjust_on_hand(&mut counter, i64::MAX, now());
        assert!(matches!(res, Err(LibraryError::InsufficientStock { .. })));
        assert_eq!(1, counter.on_hand);
    }
}
