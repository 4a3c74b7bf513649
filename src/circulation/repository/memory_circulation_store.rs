use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use crate::circulation::repository::{CirculationStore, Mutation, UnitOfWork, Write};
use crate::core::domain::Identifiable;
use crate::core::library::{LibraryError, LibraryResult, PaginatedResult};
use crate::inventory::domain::model::InventoryCounterEntity;
use crate::items::domain::model::ItemEntity;
use crate::loans::domain::model::LoanEntity;
use crate::reservations::domain::model::ReservationEntity;

#[derive(Debug, Default)]
struct Tables {
    items: HashMap<String, ItemEntity>,
    loans: HashMap<String, LoanEntity>,
    reservations: HashMap<String, ReservationEntity>,
    counters: HashMap<String, InventoryCounterEntity>,
    loans_by_item: HashMap<String, Vec<String>>,
    reservations_by_item: HashMap<String, Vec<String>>,
}

// Rows staged by a commit before they are applied.
#[derive(Debug, Default)]
struct Staged {
    items: HashMap<String, ItemEntity>,
    loans: HashMap<String, LoanEntity>,
    reservations: HashMap<String, ReservationEntity>,
    counters: HashMap<String, InventoryCounterEntity>,
}

// MemoryCirculationStore keeps every table in process. A commit holds the write lock
// while it validates versions and the per-item uniqueness constraints, so it is
// applied completely or not at all.
#[derive(Debug, Default)]
pub struct MemoryCirculationStore {
    tables: RwLock<Tables>,
}

impl MemoryCirculationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn stage<T: Identifiable + Clone>(kind: &str, write: Write<T>, stored: Option<&T>,
                                  staged: &mut HashMap<String, T>) -> LibraryResult<()> {
    let id = write.entity.id();
    let current = staged.get(id.as_str()).or(stored);
    match (write.expected_version, current) {
        (None, Some(_)) => {
            return Err(LibraryError::duplicate_key(format!("{} {} already exists", kind, id).as_str()));
        }
        (Some(_), None) => {
            return Err(LibraryError::not_found(format!("{} {} not found", kind, id).as_str()));
        }
        (Some(expected), Some(current)) if current.version() != expected => {
            return Err(LibraryError::concurrency_conflict(
                format!("{} {} is at version {}, expected {}", kind, id, current.version(), expected).as_str()));
        }
        _ => {}
    }
    staged.insert(id, write.entity);
    Ok(())
}

impl Tables {
    fn stage(&self, mutations: Vec<Mutation>) -> LibraryResult<Staged> {
        let mut staged = Staged::default();
        for mutation in mutations {
            match mutation {
                Mutation::Item(w) => {
                    let stored = self.items.get(w.entity.item_id.as_str());
                    stage("item", w, stored, &mut staged.items)?;
                }
                Mutation::Loan(w) => {
                    let stored = self.loans.get(w.entity.loan_id.as_str());
                    stage("loan", w, stored, &mut staged.loans)?;
                }
                Mutation::Reservation(w) => {
                    let stored = self.reservations.get(w.entity.reservation_id.as_str());
                    stage("reservation", w, stored, &mut staged.reservations)?;
                }
                Mutation::Counter(w) => {
                    let stored = self.counters.get(w.entity.counter_id.as_str());
                    stage("counter", w, stored, &mut staged.counters)?;
                }
            }
        }
        Ok(staged)
    }

    // one open loan and one slot-holding reservation per item, checked on the state the
    // commit would produce
    fn check_unique(&self, staged: &Staged) -> LibraryResult<()> {
        let mut affected = BTreeSet::new();
        affected.extend(staged.loans.values().map(|l| l.item_id.to_string()));
        affected.extend(staged.reservations.values().map(|r| r.item_id.to_string()));
        for item_id in affected {
            let mut loan_ids: BTreeSet<&str> = self.loans_by_item.get(&item_id)
                .map(|ids| ids.iter().map(String::as_str).collect()).unwrap_or_default();
            loan_ids.extend(staged.loans.values().filter(|l| l.item_id == item_id).map(|l| l.loan_id.as_str()));
            let open = loan_ids.iter()
                .filter_map(|id| staged.loans.get(*id).or_else(|| self.loans.get(*id)))
                .filter(|l| l.is_open())
                .count();
            if open > 1 {
                return Err(LibraryError::duplicate_key(
                    format!("item {} would have {} open loans", item_id, open).as_str()));
            }

            let mut reservation_ids: BTreeSet<&str> = self.reservations_by_item.get(&item_id)
                .map(|ids| ids.iter().map(String::as_str).collect()).unwrap_or_default();
            reservation_ids.extend(staged.reservations.values().filter(|r| r.item_id == item_id).map(|r| r.reservation_id.as_str()));
            let active = reservation_ids.iter()
                .filter_map(|id| staged.reservations.get(*id).or_else(|| self.reservations.get(*id)))
                .filter(|r| r.reservation_status.holds_slot())
                .count();
            if active > 1 {
                return Err(LibraryError::duplicate_key(
                    format!("item {} would have {} active reservations", item_id, active).as_str()));
            }
        }
        Ok(())
    }

    fn apply(&mut self, staged: Staged) {
        self.items.extend(staged.items);
        for (id, loan) in staged.loans {
            if !self.loans.contains_key(&id) {
                self.loans_by_item.entry(loan.item_id.to_string()).or_default().push(id.to_string());
            }
            self.loans.insert(id, loan);
        }
        for (id, reservation) in staged.reservations {
            if !self.reservations.contains_key(&id) {
                self.reservations_by_item.entry(reservation.item_id.to_string()).or_default().push(id.to_string());
            }
            self.reservations.insert(id, reservation);
        }
        self.counters.extend(staged.counters);
    }
}

#[async_trait]
impl CirculationStore for MemoryCirculationStore {
    async fn get_item(&self, item_id: &str) -> LibraryResult<ItemEntity> {
        self.tables.read().await.items.get(item_id).cloned()
            .ok_or_else(|| LibraryError::not_found(format!("item not found for {}", item_id).as_str()))
    }

    async fn get_loan(&self, loan_id: &str) -> LibraryResult<LoanEntity> {
        self.tables.read().await.loans.get(loan_id).cloned()
            .ok_or_else(|| LibraryError::not_found(format!("loan not found for {}", loan_id).as_str()))
    }

    async fn get_reservation(&self, reservation_id: &str) -> LibraryResult<ReservationEntity> {
        self.tables.read().await.reservations.get(reservation_id).cloned()
            .ok_or_else(|| LibraryError::not_found(format!("reservation not found for {}", reservation_id).as_str()))
    }

    async fn get_counter(&self, counter_id: &str) -> LibraryResult<InventoryCounterEntity> {
        self.tables.read().await.counters.get(counter_id).cloned()
            .ok_or_else(|| LibraryError::not_found(format!("counter not found for {}", counter_id).as_str()))
    }

    async fn find_pending_reservations(&self, item_id: &str) -> LibraryResult<Vec<ReservationEntity>> {
        let tables = self.tables.read().await;
        let mut pending: Vec<ReservationEntity> = tables.reservations_by_item.get(item_id)
            .map(|ids| ids.iter()
                .filter_map(|id| tables.reservations.get(id))
                .filter(|r| r.reservation_status.holds_slot())
                .cloned().collect())
            .unwrap_or_default();
        pending.sort_by(|a, b| a.reservation_at.cmp(&b.reservation_at).then(a.sequence.cmp(&b.sequence)));
        Ok(pending)
    }

    async fn find_expiring_reservations(&self, now: NaiveDateTime) -> LibraryResult<Vec<ReservationEntity>> {
        let tables = self.tables.read().await;
        let mut expiring: Vec<ReservationEntity> = tables.reservations.values()
            .filter(|r| r.reservation_status.holds_slot() && r.is_expired(now))
            .cloned().collect();
        expiring.sort_by(|a, b| a.expires_at.cmp(&b.expires_at));
        Ok(expiring)
    }

    async fn query_loans(&self, predicate: &HashMap<String, String>,
                         page: Option<&str>, page_size: usize) -> LibraryResult<PaginatedResult<LoanEntity>> {
        let tables = self.tables.read().await;
        let mut loans: Vec<&LoanEntity> = tables.loans.values().collect();
        loans.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.loan_id.cmp(&b.loan_id)));
        paginate(loans, predicate, page, page_size)
    }

    async fn query_reservations(&self, predicate: &HashMap<String, String>,
                                page: Option<&str>, page_size: usize) -> LibraryResult<PaginatedResult<ReservationEntity>> {
        let tables = self.tables.read().await;
        let mut reservations: Vec<&ReservationEntity> = tables.reservations.values().collect();
        reservations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.reservation_id.cmp(&b.reservation_id)));
        paginate(reservations, predicate, page, page_size)
    }

    async fn commit(&self, uow: UnitOfWork) -> LibraryResult<usize> {
        let size = uow.len();
        let mut tables = self.tables.write().await;
        let staged = tables.stage(uow.into_mutations())?;
        tables.check_unique(&staged)?;
        tables.apply(staged);
        Ok(size)
    }
}

// The page token is the offset of the first record.
fn paginate<T: Serialize + Clone>(records: Vec<&T>, predicate: &HashMap<String, String>,
                                  page: Option<&str>, page_size: usize) -> LibraryResult<PaginatedResult<T>> {
    let offset = match page {
        Some(token) => token.parse::<usize>().map_err(|_| LibraryError::validation(
            format!("invalid page token {}", token).as_str(), Some("400".to_string())))?,
        None => 0,
    };
    let mut matched = vec![];
    for record in records {
        let value = serde_json::to_value(record)?;
        if matches_predicate(&value, predicate)? {
            matched.push(record.clone());
        }
    }
    let total = matched.len();
    let page_records: Vec<T> = matched.into_iter().skip(offset).take(page_size).collect();
    let end = offset.saturating_add(page_size);
    let next_page = if end < total { Some(end.to_string()) } else { None };
    Ok(PaginatedResult::new(page, page_size, next_page, page_records))
}

// Predicate keys are `field` or `field:op` with op one of = <> < <= > >=.
fn matches_predicate(value: &Value, predicate: &HashMap<String, String>) -> LibraryResult<bool> {
    for (key, expected) in predicate {
        let (field, op) = key.split_once(':').unwrap_or((key.as_str(), "="));
        let actual = value.get(field).unwrap_or(&Value::Null);
        let ordering = match actual {
            Value::Null => if expected.is_empty() { Some(Ordering::Equal) } else { None },
            Value::String(s) => Some(s.as_str().cmp(expected.as_str())),
            Value::Bool(b) => expected.parse::<bool>().ok().map(|e| b.cmp(&e)),
            Value::Number(n) => match (n.as_f64(), expected.parse::<f64>().ok()) {
                (Some(a), Some(e)) => a.partial_cmp(&e),
                _ => None,
            },
            _ => None,
        };
        let pass = match (op, ordering) {
            ("=", Some(o)) => o == Ordering::Equal,
            ("<>", Some(o)) => o != Ordering::Equal,
            ("<>", None) => true,
            ("<", Some(o)) => o == Ordering::Less,
            ("<=", Some(o)) => o != Ordering::Greater,
            (">", Some(o)) => o == Ordering::Greater,
            (">=", Some(o)) => o != Ordering::Less,
            ("=" | "<" | "<=" | ">" | ">=", None) => false,
            (other, _) => {
                return Err(LibraryError::validation(
                    format!("unsupported operator {} for {}", other, field).as_str(), Some("400".to_string())));
            }
        };
        if !pass {
            return Ok(false);
        }
    }
    Ok(true)
}
