use std::collections::HashMap;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use crate::core::domain::Identifiable;
use crate::core::library::{LibraryResult, PaginatedResult};
use crate::inventory::domain::model::InventoryCounterEntity;
use crate::items::domain::model::ItemEntity;
use crate::loans::domain::model::LoanEntity;
use crate::reservations::domain::model::ReservationEntity;

pub mod ddb_circulation_store;
pub mod memory_circulation_store;

// Write carries an entity and the version it must still have in the store.
// No expected version means the entity must not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Write<T> {
    pub entity: T,
    pub expected_version: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Item(Write<ItemEntity>),
    Loan(Write<LoanEntity>),
    Reservation(Write<ReservationEntity>),
    Counter(Write<InventoryCounterEntity>),
}

impl Mutation {
    pub fn item_id(&self) -> &str {
        match self {
            Mutation::Item(w) => w.entity.item_id.as_str(),
            Mutation::Loan(w) => w.entity.item_id.as_str(),
            Mutation::Reservation(w) => w.entity.item_id.as_str(),
            Mutation::Counter(w) => w.entity.item_id.as_str(),
        }
    }

    pub fn is_insert(&self) -> bool {
        self.expected_version().is_none()
    }

    pub fn expected_version(&self) -> Option<i64> {
        match self {
            Mutation::Item(w) => w.expected_version,
            Mutation::Loan(w) => w.expected_version,
            Mutation::Reservation(w) => w.expected_version,
            Mutation::Counter(w) => w.expected_version,
        }
    }
}

// UnitOfWork collects the writes of one circulation operation; the store commits
// all of them or none. Updates bump the caller's copy to the version it will have
// once committed.
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    mutations: Vec<Mutation>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_item(&mut self, item: &ItemEntity) {
        self.mutations.push(Mutation::Item(insert(item)));
    }

    pub fn update_item(&mut self, item: &mut ItemEntity) {
        let expected = bump(&mut item.version);
        self.mutations.push(Mutation::Item(update(item, expected)));
    }

    pub fn insert_loan(&mut self, loan: &LoanEntity) {
        self.mutations.push(Mutation::Loan(insert(loan)));
    }

    pub fn update_loan(&mut self, loan: &mut LoanEntity) {
        let expected = bump(&mut loan.version);
        self.mutations.push(Mutation::Loan(update(loan, expected)));
    }

    pub fn insert_reservation(&mut self, reservation: &ReservationEntity) {
        self.mutations.push(Mutation::Reservation(insert(reservation)));
    }

    pub fn update_reservation(&mut self, reservation: &mut ReservationEntity) {
        let expected = bump(&mut reservation.version);
        self.mutations.push(Mutation::Reservation(update(reservation, expected)));
    }

    pub fn insert_counter(&mut self, counter: &InventoryCounterEntity) {
        self.mutations.push(Mutation::Counter(insert(counter)));
    }

    pub fn update_counter(&mut self, counter: &mut InventoryCounterEntity) {
        let expected = bump(&mut counter.version);
        self.mutations.push(Mutation::Counter(update(counter, expected)));
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

fn insert<T: Identifiable + Clone>(entity: &T) -> Write<T> {
    Write { entity: entity.clone(), expected_version: None }
}

fn update<T: Identifiable + Clone>(entity: &T, expected: i64) -> Write<T> {
    Write { entity: entity.clone(), expected_version: Some(expected) }
}

fn bump(version: &mut i64) -> i64 {
    let expected = *version;
    *version += 1;
    expected
}

// CirculationStore persists items, loans, reservations and inventory counters.
// Implementations must commit a unit of work atomically, reject any write whose
// expected version is stale with ConcurrencyConflict, and refuse a commit that would
// leave an item with two open loans or two slot-holding reservations.
#[async_trait]
pub trait CirculationStore: Sync + Send {
    async fn get_item(&self, item_id: &str) -> LibraryResult<ItemEntity>;
    async fn get_loan(&self, loan_id: &str) -> LibraryResult<LoanEntity>;
    async fn get_reservation(&self, reservation_id: &str) -> LibraryResult<ReservationEntity>;
    async fn get_counter(&self, counter_id: &str) -> LibraryResult<InventoryCounterEntity>;
    // reservations of the item in Reserved or Wait, oldest first
    async fn find_pending_reservations(&self, item_id: &str) -> LibraryResult<Vec<ReservationEntity>>;
    // slot-holding reservations whose expiry is at or before `now`
    async fn find_expiring_reservations(&self, now: NaiveDateTime) -> LibraryResult<Vec<ReservationEntity>>;
    async fn query_loans(&self, predicate: &HashMap<String, String>,
                         page: Option<&str>, page_size: usize) -> LibraryResult<PaginatedResult<LoanEntity>>;
    async fn query_reservations(&self, predicate: &HashMap<String, String>,
                                page: Option<&str>, page_size: usize) -> LibraryResult<PaginatedResult<ReservationEntity>>;
    async fn commit(&self, uow: UnitOfWork) -> LibraryResult<usize>;
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use crate::circulation::repository::{Mutation, UnitOfWork};
    use crate::items::domain::model::ItemEntity;

    #[tokio::test]
    async fn test_should_record_expected_versions() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let mut item = ItemEntity::new("42", "Dune", true, now);
        let mut uow = UnitOfWork::new();
        uow.insert_item(&item);
        uow.update_item(&mut item);
        assert_eq!(1, item.version);
        assert_eq!(2, uow.len());
        assert!(uow.mutations()[0].is_insert());
        match &uow.mutations()[1] {
            Mutation::Item(w) => {
                assert_eq!(Some(0), w.expected_version);
                assert_eq!(1, w.entity.version);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!("42", uow.mutations()[1].item_id());
    }
}
