use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use tracing::{debug, info, warn};
use crate::circulation::domain::CirculationService;
use crate::circulation::dto::{CancelDto, IssueDto, ReturnDto, SweepDto};
use crate::circulation::repository::{CirculationStore, UnitOfWork};
use crate::core::domain::{Configuration, WaitCancelPolicy};
use crate::core::events::{DomainEvent, LOAN_ISSUED, LOAN_RETURNED, RESERVATION_CANCELLED, RESERVATION_COMPLETED, RESERVATION_EXPIRED, RESERVATION_PLACED, RESERVATION_PROMOTED};
use crate::core::library::{bounded_page_size, LibraryError, LibraryResult, LoanStatus, PaginatedResult, ReservationStatus};
use crate::core::retry::RetryPolicy;
use crate::gateway::events::EventPublisher;
use crate::items::domain::model::ItemEntity;
use crate::items::dto::ItemDto;
use crate::loans::domain::lifecycle::{is_overdue, BorrowLifecycle};
use crate::loans::domain::model::LoanEntity;
use crate::loans::dto::LoanDto;
use crate::reservations::domain::model::ReservationEntity;
use crate::reservations::domain::queue::{ReservationQueue, Settlement};
use crate::reservations::dto::ReservationDto;
use crate::utils::date::serializer::time_to_json;

// ItemSnapshot is the circulation state of one item as read at the start of an attempt.
// The loaded copies tell which rows the attempt changed. Every commit rewrites the item
// row with the version read here, so a snapshot that went stale can never be committed.
struct ItemSnapshot {
    item: ItemEntity,
    loan: Option<LoanEntity>,
    pending: Vec<ReservationEntity>,
    loaded_loan: Option<LoanEntity>,
    loaded_pending: Vec<ReservationEntity>,
}

impl ItemSnapshot {
    fn position(&self, reservation_id: &str) -> Option<usize> {
        self.pending.iter().position(|r| r.reservation_id == reservation_id)
    }

    fn reservations(&self, ids: &[String]) -> Vec<ReservationDto> {
        self.pending.iter()
            .filter(|r| ids.contains(&r.reservation_id))
            .map(ReservationDto::from)
            .collect()
    }

    fn reservation(&self, id: Option<&String>) -> Option<ReservationDto> {
        id.and_then(|id| self.position(id)).map(|i| ReservationDto::from(&self.pending[i]))
    }

    fn stage(&mut self, uow: &mut UnitOfWork) {
        uow.update_item(&mut self.item);
        if let Some(loan) = self.loan.as_mut() {
            if self.loaded_loan.as_ref() != Some(&*loan) {
                uow.update_loan(loan);
            }
        }
        for (reservation, loaded) in self.pending.iter_mut().zip(self.loaded_pending.iter()) {
            if *reservation != *loaded {
                uow.update_reservation(reservation);
            }
        }
    }
}

pub struct CirculationServiceImpl {
    lifecycle: BorrowLifecycle,
    queue: ReservationQueue,
    wait_cancel_policy: WaitCancelPolicy,
    retry: RetryPolicy,
    store: Arc<dyn CirculationStore>,
    events_publisher: Box<dyn EventPublisher>,
}

impl CirculationServiceImpl {
    pub fn new(config: &Configuration, store: Arc<dyn CirculationStore>,
               events_publisher: Box<dyn EventPublisher>) -> Self {
        Self {
            lifecycle: BorrowLifecycle::new(config),
            queue: ReservationQueue::new(config),
            wait_cancel_policy: config.wait_cancel_policy,
            retry: RetryPolicy::from_config(config),
            store,
            events_publisher,
        }
    }

    async fn load(&self, item_id: &str) -> LibraryResult<ItemSnapshot> {
        let item = self.store.get_item(item_id).await?;
        let loan = match item.open_loan_id.as_deref() {
            Some(loan_id) => Some(self.store.get_loan(loan_id).await?),
            None => None,
        };
        let pending = self.store.find_pending_reservations(item_id).await?;
        Ok(ItemSnapshot {
            loaded_loan: loan.clone(),
            loaded_pending: pending.clone(),
            item,
            loan,
            pending,
        })
    }

    async fn publish(&self, event: serde_json::Result<DomainEvent>) {
        match event {
            Ok(event) => {
                if let Err(err) = self.events_publisher.publish(&event).await {
                    warn!("failed to publish {} for {}: {}", event.name, event.key, err);
                }
            }
            Err(err) => {
                warn!("failed to build domain event: {}", err);
            }
        }
    }

    async fn publish_reservation(&self, name: &str, reservation: &ReservationDto, now: NaiveDateTime) {
        let metadata = HashMap::from([
            ("item_id".to_string(), reservation.item_id.to_string()),
            ("borrower_id".to_string(), reservation.borrower_id.to_string())]);
        self.publish(DomainEvent::updated(name, "reservations", reservation.reservation_id.as_str(),
                                          &metadata, reservation, now)).await;
    }

    async fn publish_settlement(&self, expired: &[ReservationDto], promoted: Option<&ReservationDto>, now: NaiveDateTime) {
        for reservation in expired {
            self.publish_reservation(RESERVATION_EXPIRED, reservation, now).await;
        }
        if let Some(reservation) = promoted {
            self.publish_reservation(RESERVATION_PROMOTED, reservation, now).await;
        }
    }

    async fn try_register_item(&self, item_id: &str, title: &str, borrowable: bool, now: NaiveDateTime) -> LibraryResult<ItemDto> {
        let mut uow = UnitOfWork::new();
        let item = match self.store.get_item(item_id).await {
            Ok(mut item) => {
                item.title = title.to_string();
                item.borrowable = borrowable;
                item.updated_at = now;
                uow.update_item(&mut item);
                item
            }
            Err(LibraryError::NotFound { .. }) => {
                let item = ItemEntity::new(item_id, title, borrowable, now);
                uow.insert_item(&item);
                item
            }
            Err(err) => return Err(err),
        };
        // a concurrent first registration won the insert, re-read and update instead
        self.store.commit(uow).await.map_err(|err| match err {
            LibraryError::DuplicateKey { message } => LibraryError::concurrency_conflict(message.as_str()),
            other => other,
        })?;
        info!("registered item {} borrowable={}", item_id, borrowable);
        Ok(ItemDto::from(&item))
    }

    async fn try_borrow(&self, item_id: &str, borrower_id: &str, as_of: NaiveDateTime, now: NaiveDateTime) -> LibraryResult<LoanDto> {
        let mut snap = self.load(item_id).await?;
        let settlement = self.queue.settle(&mut snap.item, &mut snap.pending, now);
        let loan = self.lifecycle.issue_loan(&mut snap.item, borrower_id, None, as_of, now)?;
        let mut uow = UnitOfWork::new();
        snap.stage(&mut uow);
        uow.insert_loan(&loan);
        self.store.commit(uow).await?;

        let loan = LoanDto::from(&loan);
        info!("issued loan {} of item {} to {} due {}", loan.loan_id, item_id, borrower_id, loan.due_at);
        self.publish_settlement(&snap.reservations(&settlement.expired), snap.reservation(settlement.promoted.as_ref()).as_ref(), now).await;
        let metadata = HashMap::from([
            ("item_id".to_string(), item_id.to_string()),
            ("borrower_id".to_string(), borrower_id.to_string())]);
        self.publish(DomainEvent::added(LOAN_ISSUED, "loans", loan.loan_id.as_str(), &metadata, &loan, now)).await;
        Ok(loan)
    }

    async fn try_return(&self, loan_id: &str, now: NaiveDateTime) -> LibraryResult<ReturnDto> {
        let loan = self.store.get_loan(loan_id).await?;
        if loan.loan_status != LoanStatus::Borrowed {
            return Err(LibraryError::invalid_state(
                format!("loan {} is {} and cannot be returned", loan_id, loan.loan_status).as_str()));
        }
        let mut snap = self.load(loan.item_id.as_str()).await?;
        let overdue_days = match snap.loan.as_mut() {
            Some(open) if open.loan_id == loan_id => self.lifecycle.close_loan(open, &mut snap.item, now)?,
            _ => {
                // returned by someone else between the two reads
                return Err(LibraryError::concurrency_conflict(
                    format!("loan {} is no longer the open loan of item {}", loan_id, loan.item_id).as_str()));
            }
        };
        let settlement = self.queue.settle(&mut snap.item, &mut snap.pending, now);
        debug!("return of loan {} settled item {}: {:?}", loan_id, loan.item_id, settlement);
        let mut uow = UnitOfWork::new();
        snap.stage(&mut uow);
        self.store.commit(uow).await?;

        let closed = snap.loan.as_ref().map(LoanDto::from).unwrap_or_else(|| LoanDto::from(&loan));
        let res = ReturnDto {
            loan: closed,
            overdue_days,
            promoted: snap.reservation(settlement.promoted.as_ref()),
            expired: snap.reservations(&settlement.expired),
            item: ItemDto::from(&snap.item),
        };
        info!("returned loan {} of item {} overdue_days={} promoted={:?}",
            loan_id, loan.item_id, overdue_days, settlement.promoted);
        let metadata = HashMap::from([
            ("item_id".to_string(), res.loan.item_id.to_string()),
            ("borrower_id".to_string(), res.loan.borrower_id.to_string()),
            ("overdue_days".to_string(), overdue_days.to_string())]);
        self.publish(DomainEvent::updated(LOAN_RETURNED, "loans", loan_id, &metadata, &res.loan, now)).await;
        self.publish_settlement(&res.expired, res.promoted.as_ref(), now).await;
        Ok(res)
    }

    async fn try_reserve(&self, item_id: &str, borrower_id: &str, now: NaiveDateTime) -> LibraryResult<ReservationDto> {
        let mut snap = self.load(item_id).await?;
        let settlement = self.queue.settle(&mut snap.item, &mut snap.pending, now);
        let reservation = self.queue.enqueue(&mut snap.item, snap.loan.as_ref(), &snap.pending, borrower_id, now)?;
        let mut uow = UnitOfWork::new();
        snap.stage(&mut uow);
        uow.insert_reservation(&reservation);
        self.store.commit(uow).await?;

        let reservation = ReservationDto::from(&reservation);
        info!("placed reservation {} on item {} for {} ready {:?}",
            reservation.reservation_id, item_id, borrower_id, reservation.ready_at);
        self.publish_settlement(&snap.reservations(&settlement.expired), snap.reservation(settlement.promoted.as_ref()).as_ref(), now).await;
        self.publish_reservation(RESERVATION_PLACED, &reservation, now).await;
        Ok(reservation)
    }

    async fn try_cancel(&self, reservation_id: &str, now: NaiveDateTime) -> LibraryResult<CancelDto> {
        let reservation = self.store.get_reservation(reservation_id).await?;
        let mut snap = self.load(reservation.item_id.as_str()).await?;
        let expired = self.queue.settle_expired(&mut snap.item, &mut snap.pending, now);
        let idx = match snap.position(reservation_id) {
            Some(idx) => idx,
            None if reservation.reservation_status.holds_slot() => {
                return Err(LibraryError::concurrency_conflict(
                    format!("reservation {} changed while cancelling", reservation_id).as_str()));
            }
            None => {
                return Err(LibraryError::invalid_state(
                    format!("reservation {} is {} and cannot be cancelled",
                            reservation_id, reservation.reservation_status).as_str()));
            }
        };
        let (released, promoted) = self.queue.withdraw(&mut snap.item, &mut snap.pending, idx, self.wait_cancel_policy, now)?;
        if let Some(loan) = snap.loan.as_mut() {
            if loan.reservation_id.as_deref() == Some(reservation_id) {
                loan.reservation_id = None;
                loan.updated_at = now;
            }
        }
        let mut uow = UnitOfWork::new();
        snap.stage(&mut uow);
        self.store.commit(uow).await?;

        let res = CancelDto {
            reservation: ReservationDto::from(&snap.pending[idx]),
            promoted: snap.reservation(promoted.as_ref()),
            item: ItemDto::from(&snap.item),
        };
        info!("cancelled reservation {} on item {} released={} promoted={:?}",
            reservation_id, reservation.item_id, released, promoted);
        self.publish_reservation(RESERVATION_CANCELLED, &res.reservation, now).await;
        self.publish_settlement(&snap.reservations(&expired), res.promoted.as_ref(), now).await;
        Ok(res)
    }

    async fn try_issue_from_wait(&self, reservation_id: &str, borrower_override: Option<&str>,
                                 now: NaiveDateTime) -> LibraryResult<IssueDto> {
        let reservation = self.store.get_reservation(reservation_id).await?;
        match self.queue.check_issuable(&reservation, now) {
            Ok(()) => {}
            // lapsed but still bound, settle it below
            Err(LibraryError::Expired { .. }) if reservation.reservation_status == ReservationStatus::Wait => {}
            Err(err) => return Err(err),
        }
        let mut snap = self.load(reservation.item_id.as_str()).await?;
        let idx = snap.position(reservation_id).ok_or_else(|| LibraryError::concurrency_conflict(
            format!("reservation {} changed while issuing", reservation_id).as_str()))?;
        if let Err(err) = self.queue.check_issuable(&snap.pending[idx], now) {
            if matches!(err, LibraryError::Expired { .. }) {
                self.commit_settlement(snap, now).await?;
            }
            return Err(err);
        }
        let borrower_id = borrower_override.unwrap_or(reservation.borrower_id.as_str());
        let loan = self.lifecycle.issue_loan(&mut snap.item, borrower_id, Some(reservation_id), now, now)?;
        self.queue.complete(&mut snap.item, &mut snap.pending[idx], loan.loan_id.as_str(), now);
        let mut uow = UnitOfWork::new();
        snap.stage(&mut uow);
        uow.insert_loan(&loan);
        self.store.commit(uow).await?;

        let res = IssueDto {
            loan: LoanDto::from(&loan),
            reservation: ReservationDto::from(&snap.pending[idx]),
        };
        info!("issued loan {} of item {} to {} from reservation {}",
            res.loan.loan_id, res.loan.item_id, borrower_id, reservation_id);
        let metadata = HashMap::from([
            ("item_id".to_string(), res.loan.item_id.to_string()),
            ("borrower_id".to_string(), borrower_id.to_string()),
            ("reservation_id".to_string(), reservation_id.to_string())]);
        self.publish(DomainEvent::added(LOAN_ISSUED, "loans", res.loan.loan_id.as_str(), &metadata, &res.loan, now)).await;
        self.publish_reservation(RESERVATION_COMPLETED, &res.reservation, now).await;
        Ok(res)
    }

    // An issue attempt on a lapsed hold still counts as a touch: the hold is expired and
    // the next reservation promoted before the caller sees Expired.
    async fn commit_settlement(&self, mut snap: ItemSnapshot, now: NaiveDateTime) -> LibraryResult<()> {
        let Settlement { expired, promoted } = self.queue.settle(&mut snap.item, &mut snap.pending, now);
        let mut uow = UnitOfWork::new();
        snap.stage(&mut uow);
        self.store.commit(uow).await?;
        info!("issue attempt expired {:?} on item {} promoted={:?}", expired, snap.item.item_id, promoted);
        self.publish_settlement(&snap.reservations(&expired), snap.reservation(promoted.as_ref()).as_ref(), now).await;
        Ok(())
    }

    async fn try_settle_item(&self, item_id: &str, now: NaiveDateTime) -> LibraryResult<(Vec<ReservationDto>, Option<ReservationDto>)> {
        let mut snap = self.load(item_id).await?;
        let Settlement { expired, promoted } = self.queue.settle(&mut snap.item, &mut snap.pending, now);
        if expired.is_empty() && promoted.is_none() {
            return Ok((vec![], None));
        }
        let mut uow = UnitOfWork::new();
        snap.stage(&mut uow);
        self.store.commit(uow).await?;

        let expired = snap.reservations(&expired);
        let promoted = snap.reservation(promoted.as_ref());
        self.publish_settlement(&expired, promoted.as_ref(), now).await;
        Ok((expired, promoted))
    }
}

#[async_trait]
impl CirculationService for CirculationServiceImpl {
    async fn register_item(&self, item_id: &str, title: &str, borrowable: bool, now: NaiveDateTime) -> LibraryResult<ItemDto> {
        self.retry.run("register_item", move || self.try_register_item(item_id, title, borrowable, now)).await
    }

    async fn find_item(&self, item_id: &str) -> LibraryResult<ItemDto> {
        self.store.get_item(item_id).await.map(|item| ItemDto::from(&item))
    }

    async fn borrow(&self, item_id: &str, borrower_id: &str, as_of: NaiveDateTime, now: NaiveDateTime) -> LibraryResult<LoanDto> {
        self.retry.run("borrow", move || self.try_borrow(item_id, borrower_id, as_of, now)).await
    }

    async fn return_loan(&self, loan_id: &str, now: NaiveDateTime) -> LibraryResult<ReturnDto> {
        self.retry.run("return_loan", move || self.try_return(loan_id, now)).await
    }

    async fn reserve(&self, item_id: &str, borrower_id: &str, now: NaiveDateTime) -> LibraryResult<ReservationDto> {
        self.retry.run("reserve", move || self.try_reserve(item_id, borrower_id, now)).await
    }

    async fn cancel_reservation(&self, reservation_id: &str, now: NaiveDateTime) -> LibraryResult<CancelDto> {
        self.retry.run("cancel_reservation", move || self.try_cancel(reservation_id, now)).await
    }

    async fn issue_from_wait(&self, reservation_id: &str, borrower_override: Option<&str>,
                             now: NaiveDateTime) -> LibraryResult<IssueDto> {
        self.retry.run("issue_from_wait", move || self.try_issue_from_wait(reservation_id, borrower_override, now)).await
    }

    async fn expire_sweep(&self, now: NaiveDateTime) -> LibraryResult<SweepDto> {
        let expiring = self.store.find_expiring_reservations(now).await?;
        let item_ids: BTreeSet<String> = expiring.into_iter().map(|r| r.item_id).collect();
        let mut sweep = SweepDto::default();
        for item_id in item_ids {
            let id = item_id.as_str();
            match self.retry.run("expire_sweep", move || self.try_settle_item(id, now)).await {
                Ok((expired, promoted)) => {
                    sweep.expired.extend(expired);
                    sweep.promoted.extend(promoted);
                }
                Err(err) => {
                    warn!("expiry sweep could not settle item {}: {}", item_id, err);
                    sweep.failed.push(item_id.to_string());
                }
            }
        }
        info!("expiry sweep at {} expired={} promoted={} failed={}",
            now, sweep.expired.len(), sweep.promoted.len(), sweep.failed.len());
        Ok(sweep)
    }

    async fn find_loan(&self, loan_id: &str) -> LibraryResult<LoanDto> {
        self.store.get_loan(loan_id).await.map(|loan| LoanDto::from(&loan))
    }

    async fn find_reservation(&self, reservation_id: &str) -> LibraryResult<ReservationDto> {
        self.store.get_reservation(reservation_id).await.map(|reservation| ReservationDto::from(&reservation))
    }

    async fn query_loans(&self, predicate: &HashMap<String, String>,
                         page: Option<&str>, page_size: usize) -> LibraryResult<PaginatedResult<LoanDto>> {
        let page_size = bounded_page_size(page_size);
        let res = self.store.query_loans(predicate, page, page_size).await?;
        let records = res.records.iter().map(LoanDto::from).collect();
        Ok(PaginatedResult::new(page, page_size, res.next_page, records))
    }

    // open loans whose due date is before today
    async fn query_overdue(&self, now: NaiveDateTime,
                           page: Option<&str>, page_size: usize) -> LibraryResult<PaginatedResult<LoanDto>> {
        let page_size = bounded_page_size(page_size);
        let start_of_day = now.date().and_hms_opt(0, 0, 0).unwrap_or(now);
        let predicate = HashMap::from([
            ("loan_status".to_string(), LoanStatus::Borrowed.to_string()),
            ("due_at:<".to_string(), time_to_json(start_of_day)),
        ]);
        let res = self.store.query_loans(&predicate, page, page_size).await?;
        let records = res.records.iter()
            .filter(|loan| is_overdue(loan, now))
            .map(LoanDto::from)
            .collect();
        Ok(PaginatedResult::new(page, page_size, res.next_page, records))
    }

    async fn query_reservations(&self, predicate: &HashMap<String, String>,
                                page: Option<&str>, page_size: usize) -> LibraryResult<PaginatedResult<ReservationDto>> {
        let page_size = bounded_page_size(page_size);
        let res = self.store.query_reservations(predicate, page, page_size).await?;
        let records = res.records.iter().map(ReservationDto::from).collect();
        Ok(PaginatedResult::new(page, page_size, res.next_page, records))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use crate::circulation::domain::CirculationService;
    use crate::circulation::domain::service::CirculationServiceImpl;
    use crate::circulation::repository::memory_circulation_store::MemoryCirculationStore;
    use crate::core::domain::{Configuration, WaitCancelPolicy};
    use crate::core::events::{LOAN_RETURNED, RESERVATION_PROMOTED};
    use crate::core::library::{LibraryError, LoanStatus, ReservationStatus, MAX_PAGE_SIZE};
    use crate::gateway::logs::publisher::LogPublisher;

    fn day(n: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap() + Duration::days(n)
    }

    async fn build(config: &Configuration) -> (Arc<CirculationServiceImpl>, LogPublisher) {
        let publisher = LogPublisher::new();
        let svc = CirculationServiceImpl::new(config, Arc::new(MemoryCirculationStore::new()), Box::new(publisher.clone()));
        svc.register_item("42", "Dune", true, day(0)).await.expect("should register item");
        (Arc::new(svc), publisher)
    }

    async fn build_default() -> (Arc<CirculationServiceImpl>, LogPublisher) {
        build(&Configuration::new("test")).await
    }

    #[tokio::test]
    async fn test_should_run_borrow_reserve_return_issue_scenario() {
        let (svc, publisher) = build_default().await;
        let loan = svc.borrow("42", "7", day(0), day(0)).await.expect("should borrow");
        assert_eq!(day(14), loan.due_at);
        assert_eq!(LoanStatus::Borrowed, loan.loan_status);

        let reservation = svc.reserve("42", "9", day(1)).await.expect("should reserve");
        assert_eq!(ReservationStatus::Reserved, reservation.reservation_status);
        assert_eq!(Some(day(14)), reservation.ready_at);
        assert_eq!(Some(day(17)), reservation.expires_at);

        let returned = svc.return_loan(loan.loan_id.as_str(), day(10)).await.expect("should return");
        assert_eq!(LoanStatus::Returned, returned.loan.loan_status);
        assert_eq!(0, returned.overdue_days);
        let promoted = returned.promoted.expect("should promote");
        assert_eq!(reservation.reservation_id, promoted.reservation_id);
        assert_eq!(ReservationStatus::Wait, promoted.reservation_status);
        assert_eq!(Some(day(10)), promoted.ready_at);
        assert_eq!(Some(day(13)), promoted.expires_at);
        assert!(!returned.item.available);
        assert_eq!(Some(reservation.reservation_id.clone()), returned.item.held_for);

        // nobody else can borrow the held item
        let res = svc.borrow("42", "11", day(11), day(11)).await;
        assert!(matches!(res, Err(LibraryError::ItemUnavailable { .. })));

        let issued = svc.issue_from_wait(reservation.reservation_id.as_str(), None, day(12)).await.expect("should issue");
        assert_eq!("9", issued.loan.borrower_id.as_str());
        assert_eq!(Some(reservation.reservation_id.clone()), issued.loan.reservation_id);
        assert_eq!(ReservationStatus::Complete, issued.reservation.reservation_status);
        assert_eq!(Some(issued.loan.loan_id.clone()), issued.reservation.loan_id);

        let item = svc.find_item("42").await.expect("should find item");
        assert_eq!(Some(issued.loan.loan_id.clone()), item.open_loan_id);
        assert_eq!(None, item.held_for);
        assert_eq!(None, item.active_reservation_id);

        let names: Vec<String> = publisher.published().await.into_iter().map(|e| e.name).collect();
        assert!(names.contains(&RESERVATION_PROMOTED.to_string()));
        assert!(names.contains(&LOAN_RETURNED.to_string()));
    }

    #[tokio::test]
    async fn test_should_reject_issue_after_hold_expired() {
        let (svc, publisher) = build_default().await;
        let loan = svc.borrow("42", "7", day(0), day(0)).await.expect("should borrow");
        let reservation = svc.reserve("42", "9", day(1)).await.expect("should reserve");
        let _ = svc.return_loan(loan.loan_id.as_str(), day(10)).await.expect("should return");
        let res = svc.issue_from_wait(reservation.reservation_id.as_str(), None, day(14)).await;
        assert!(matches!(res, Err(LibraryError::Expired { .. })));
        // nothing was issued and the lapsed hold released the item
        let item = svc.find_item("42").await.expect("should find item");
        assert_eq!(None, item.open_loan_id);
        assert_eq!(None, item.held_for);
        assert_eq!(None, item.active_reservation_id);
        assert!(item.available);
        let expired = svc.find_reservation(reservation.reservation_id.as_str()).await.expect("should find");
        assert_eq!(ReservationStatus::Expired, expired.reservation_status);
        assert!(publisher.published().await.iter().any(|e| e.key == reservation.reservation_id && e.name == "reservation_expired"));

        let res = svc.issue_from_wait(reservation.reservation_id.as_str(), None, day(15)).await;
        assert!(matches!(res, Err(LibraryError::Expired { .. })));
    }

    #[tokio::test]
    async fn test_should_restore_availability_after_round_trip() {
        let (svc, _) = build_default().await;
        assert!(svc.find_item("42").await.expect("should find item").available);
        let loan = svc.borrow("42", "7", day(0), day(0)).await.expect("should borrow");
        assert!(!svc.find_item("42").await.expect("should find item").available);
        let returned = svc.return_loan(loan.loan_id.as_str(), day(3)).await.expect("should return");
        assert_eq!(None, returned.promoted);
        assert!(returned.item.available);
        assert!(svc.find_item("42").await.expect("should find item").available);
    }

    #[tokio::test]
    async fn test_should_reject_second_return() {
        let (svc, publisher) = build_default().await;
        let loan = svc.borrow("42", "7", day(0), day(0)).await.expect("should borrow");
        let reservation = svc.reserve("42", "9", day(1)).await.expect("should reserve");
        let _ = svc.return_loan(loan.loan_id.as_str(), day(5)).await.expect("should return");
        let res = svc.return_loan(loan.loan_id.as_str(), day(6)).await;
        assert!(matches!(res, Err(LibraryError::InvalidState { .. })));

        let reservation = svc.find_reservation(reservation.reservation_id.as_str()).await.expect("should find");
        assert_eq!(ReservationStatus::Wait, reservation.reservation_status);
        assert_eq!(Some(day(8)), reservation.expires_at);
        let promotions = publisher.published().await.into_iter().filter(|e| e.name == RESERVATION_PROMOTED).count();
        assert_eq!(1, promotions);
    }

    #[tokio::test]
    async fn test_should_record_overdue_return() {
        let (svc, publisher) = build_default().await;
        let loan = svc.borrow("42", "7", day(0), day(0)).await.expect("should borrow");
        let overdue = svc.query_overdue(day(15), None, 10).await.expect("should query");
        assert_eq!(1, overdue.records.len());
        assert_eq!(0, svc.query_overdue(day(14), None, 10).await.expect("should query").records.len());

        let returned = svc.return_loan(loan.loan_id.as_str(), day(17)).await.expect("should return");
        assert_eq!(3, returned.overdue_days);
        assert_eq!(LoanStatus::Overdue, returned.loan.loan_status);
        assert_eq!(0, svc.query_overdue(day(20), None, 10).await.expect("should query").records.len());

        let res = svc.query_loans(&HashMap::new(), Some("1"), usize::MAX).await.expect("should query");
        assert_eq!(MAX_PAGE_SIZE, res.page_size);
        assert_eq!(0, res.records.len());
        let res = svc.query_loans(&HashMap::new(), None, 0).await.expect("should query");
        assert_eq!(1, res.page_size);
        assert_eq!(1, res.records.len());

        let event = publisher.published().await.into_iter().find(|e| e.name == LOAN_RETURNED).expect("should publish");
        assert_eq!(Some(&"3".to_string()), event.metadata.get("overdue_days"));
    }

    #[tokio::test]
    async fn test_should_validate_borrow() {
        let (svc, _) = build_default().await;
        let res = svc.borrow("42", "7", day(-1), day(0)).await;
        assert!(matches!(res, Err(LibraryError::InvalidDate { .. })));
        let res = svc.borrow("43", "7", day(0), day(0)).await;
        assert!(matches!(res, Err(LibraryError::NotFound { .. })));

        // a future loan date is allowed
        let loan = svc.borrow("42", "7", day(2), day(0)).await.expect("should borrow");
        assert_eq!(day(16), loan.due_at);
    }

    #[tokio::test]
    async fn test_should_validate_reserve() {
        let (svc, _) = build_default().await;
        let res = svc.reserve("42", "9", day(0)).await;
        assert!(matches!(res, Err(LibraryError::ItemCurrentlyAvailable { .. })));

        let _ = svc.borrow("42", "7", day(0), day(0)).await.expect("should borrow");
        let res = svc.reserve("42", "7", day(1)).await;
        assert!(matches!(res, Err(LibraryError::AlreadyBorrowing { .. })));

        let _ = svc.reserve("42", "9", day(1)).await.expect("should reserve");
        let res = svc.reserve("42", "11", day(2)).await;
        assert!(matches!(res, Err(LibraryError::DuplicateActiveReservation { .. })));
        let res = svc.reserve("42", "9", day(2)).await;
        assert!(matches!(res, Err(LibraryError::DuplicateActiveReservation { .. })));
    }

    #[tokio::test]
    async fn test_should_expire_hold_when_item_is_touched() {
        let (svc, _) = build_default().await;
        let loan = svc.borrow("42", "7", day(0), day(0)).await.expect("should borrow");
        let reservation = svc.reserve("42", "9", day(1)).await.expect("should reserve");
        let _ = svc.return_loan(loan.loan_id.as_str(), day(10)).await.expect("should return");

        // the hold lapsed at day 13, the next borrower gets the item
        let next = svc.borrow("42", "11", day(14), day(14)).await.expect("should borrow");
        assert_eq!("11", next.borrower_id.as_str());
        let expired = svc.find_reservation(reservation.reservation_id.as_str()).await.expect("should find");
        assert_eq!(ReservationStatus::Expired, expired.reservation_status);

        // and the slot is free for a new reservation
        let again = svc.reserve("42", "9", day(15)).await.expect("should reserve");
        assert_eq!(ReservationStatus::Reserved, again.reservation_status);
    }

    #[tokio::test]
    async fn test_should_sweep_expired_holds() {
        let (svc, publisher) = build_default().await;
        let loan = svc.borrow("42", "7", day(0), day(0)).await.expect("should borrow");
        let reservation = svc.reserve("42", "9", day(1)).await.expect("should reserve");
        let _ = svc.return_loan(loan.loan_id.as_str(), day(10)).await.expect("should return");

        let sweep = svc.expire_sweep(day(12)).await.expect("should sweep");
        assert_eq!(0, sweep.expired.len());

        let sweep = svc.expire_sweep(day(13)).await.expect("should sweep");
        assert_eq!(1, sweep.expired.len());
        assert_eq!(reservation.reservation_id, sweep.expired[0].reservation_id);
        assert_eq!(ReservationStatus::Expired, sweep.expired[0].reservation_status);
        assert_eq!(0, sweep.promoted.len());
        assert!(sweep.failed.is_empty());
        assert!(svc.find_item("42").await.expect("should find item").available);
        assert!(publisher.published().await.iter().any(|e| e.key == reservation.reservation_id && e.name == "reservation_expired"));

        let sweep = svc.expire_sweep(day(14)).await.expect("should sweep");
        assert!(sweep.expired.is_empty());
        assert!(sweep.promoted.is_empty());
    }

    #[tokio::test]
    async fn test_should_cancel_reserved_and_clear_slot() {
        let (svc, _) = build_default().await;
        let _ = svc.borrow("42", "7", day(0), day(0)).await.expect("should borrow");
        let reservation = svc.reserve("42", "9", day(1)).await.expect("should reserve");
        let cancelled = svc.cancel_reservation(reservation.reservation_id.as_str(), day(2)).await.expect("should cancel");
        assert_eq!(ReservationStatus::Cancelled, cancelled.reservation.reservation_status);
        assert_eq!(None, cancelled.reservation.expires_at);
        assert_eq!(Some(day(2)), cancelled.reservation.cancelled_at);
        assert_eq!(None, cancelled.item.active_reservation_id);

        let res = svc.cancel_reservation(reservation.reservation_id.as_str(), day(3)).await;
        assert!(matches!(res, Err(LibraryError::InvalidState { .. })));
        let res = svc.cancel_reservation("missing", day(3)).await;
        assert!(matches!(res, Err(LibraryError::NotFound { .. })));
        let _ = svc.reserve("42", "11", day(3)).await.expect("should reserve again");
    }

    async fn promoted_hold(svc: &CirculationServiceImpl) -> String {
        let loan = svc.borrow("42", "7", day(0), day(0)).await.expect("should borrow");
        let reservation = svc.reserve("42", "9", day(1)).await.expect("should reserve");
        let _ = svc.return_loan(loan.loan_id.as_str(), day(10)).await.expect("should return");
        reservation.reservation_id
    }

    #[tokio::test]
    async fn test_should_follow_wait_cancel_policy() {
        let (svc, _) = build_default().await;
        let hold = promoted_hold(&svc).await;
        let res = svc.cancel_reservation(hold.as_str(), day(11)).await;
        assert!(matches!(res, Err(LibraryError::InvalidState { .. })));

        for policy in [WaitCancelPolicy::Cancel, WaitCancelPolicy::CancelAndPromote] {
            let mut config = Configuration::new("test");
            config.wait_cancel_policy = policy;
            let (svc, _) = build(&config).await;
            let hold = promoted_hold(&svc).await;
            let cancelled = svc.cancel_reservation(hold.as_str(), day(11)).await.expect("should cancel");
            assert_eq!(ReservationStatus::Cancelled, cancelled.reservation.reservation_status);
            assert_eq!(None, cancelled.promoted);
            assert!(cancelled.item.available);
        }
    }

    #[tokio::test]
    async fn test_should_issue_from_wait_to_override_borrower() {
        let (svc, _) = build_default().await;
        let hold = promoted_hold(&svc).await;
        let issued = svc.issue_from_wait(hold.as_str(), Some("12"), day(11)).await.expect("should issue");
        assert_eq!("12", issued.loan.borrower_id.as_str());
        assert_eq!(day(25), issued.loan.due_at);
        let res = svc.issue_from_wait(hold.as_str(), None, day(11)).await;
        assert!(matches!(res, Err(LibraryError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_should_not_issue_reserved_hold() {
        let (svc, _) = build_default().await;
        let _ = svc.borrow("42", "7", day(0), day(0)).await.expect("should borrow");
        let reservation = svc.reserve("42", "9", day(1)).await.expect("should reserve");
        let res = svc.issue_from_wait(reservation.reservation_id.as_str(), None, day(2)).await;
        assert!(matches!(res, Err(LibraryError::InvalidState { .. })));
        let res = svc.issue_from_wait("missing", None, day(2)).await;
        assert!(matches!(res, Err(LibraryError::NotFound { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_should_promote_once_under_concurrent_returns() {
        let (svc, publisher) = build_default().await;
        let loan = svc.borrow("42", "7", day(0), day(0)).await.expect("should borrow");
        let reservation = svc.reserve("42", "9", day(1)).await.expect("should reserve");

        let mut handles = vec![];
        for _ in 0..2 {
            let svc = svc.clone();
            let loan_id = loan.loan_id.clone();
            handles.push(tokio::spawn(async move { svc.return_loan(loan_id.as_str(), day(10)).await }));
        }
        let mut succeeded = 0;
        for handle in handles {
            match handle.await.expect("should join") {
                Ok(returned) => {
                    succeeded += 1;
                    assert_eq!(Some(reservation.reservation_id.clone()), returned.promoted.map(|r| r.reservation_id));
                }
                Err(err) => assert!(matches!(err, LibraryError::InvalidState { .. }), "unexpected {:?}", err),
            }
        }
        assert_eq!(1, succeeded);
        let promotions = publisher.published().await.into_iter().filter(|e| e.name == RESERVATION_PROMOTED).count();
        assert_eq!(1, promotions);
        let waiting = svc.query_reservations(&HashMap::from([("reservation_status".to_string(), "Wait".to_string())]),
                                             None, 10).await.expect("should query");
        assert_eq!(1, waiting.records.len());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_should_lend_once_under_concurrent_borrows() {
        let (svc, _) = build_default().await;
        let mut handles = vec![];
        for borrower in 0..6 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                svc.borrow("42", borrower.to_string().as_str(), day(0), day(0)).await
            }));
        }
        let mut succeeded = 0;
        for handle in handles {
            match handle.await.expect("should join") {
                Ok(_) => succeeded += 1,
                Err(err) => assert!(matches!(err, LibraryError::ItemUnavailable { .. }), "unexpected {:?}", err),
            }
        }
        assert_eq!(1, succeeded);
        let open = svc.query_loans(&HashMap::from([("loan_status".to_string(), "Borrowed".to_string())]),
                                   None, 10).await.expect("should query");
        assert_eq!(1, open.records.len());
    }
}
