use chrono::{Duration, NaiveDateTime};
use tracing::debug;
use crate::core::domain::{Configuration, WaitCancelPolicy};
use crate::core::library::{LibraryError, LibraryResult, ReservationStatus};
use crate::items::domain::Item;
use crate::items::domain::model::ItemEntity;
use crate::loans::domain::model::LoanEntity;
use crate::reservations::domain::model::ReservationEntity;

// Settlement lists what the queue changed while settling an item.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settlement {
    pub expired: Vec<String>,
    pub promoted: Option<String>,
}

// ReservationQueue is the ordered waiting list of one item. It works on the
// non-terminal reservations of the item (`pending`) loaded by the caller and keeps
// the item's reservation slot and hold binding in step with them.
#[derive(Debug, Clone)]
pub struct ReservationQueue {
    branch_id: String,
    hold_window: Duration,
}

impl ReservationQueue {
    pub fn new(config: &Configuration) -> Self {
        Self {
            branch_id: config.branch_id.to_string(),
            hold_window: config.hold_window(),
        }
    }

    pub fn enqueue(&self, item: &mut ItemEntity, open_loan: Option<&LoanEntity>, pending: &[ReservationEntity],
                   borrower_id: &str, now: NaiveDateTime) -> LibraryResult<ReservationEntity> {
        if !item.borrowable {
            return Err(LibraryError::item_unavailable(
                format!("item {} does not circulate", item.item_id).as_str()));
        }
        if !item.is_on_loan() && !item.is_held() {
            return Err(LibraryError::item_currently_available(
                format!("item {} is available, borrow it instead", item.item_id).as_str()));
        }
        if let Some(active) = pending.iter().find(|r| r.is_active(now)) {
            return Err(LibraryError::duplicate_active_reservation(
                format!("item {} already has active reservation {}", item.item_id, active.reservation_id).as_str()));
        }
        if open_loan.map_or(false, |loan| loan.borrower_id == borrower_id) {
            return Err(LibraryError::already_borrowing(
                format!("borrower {} already has item {} on loan", borrower_id, item.item_id).as_str()));
        }
        let sequence = item.next_reservation_seq();
        let mut reservation = ReservationEntity::new(self.branch_id.as_str(), item.item_id.as_str(), borrower_id, sequence, now);
        reservation.ready_at = open_loan.map(|loan| loan.due_at);
        reservation.expires_at = reservation.ready_at.map(|ready_at| ready_at + self.hold_window);
        item.active_reservation_id = Some(reservation.reservation_id.to_string());
        item.updated_at = now;
        Ok(reservation)
    }

    // Transitions every slot-holding reservation whose expiry has passed to Expired and
    // unbinds the item from it. Returns the expired reservation ids.
    pub fn settle_expired(&self, item: &mut ItemEntity, pending: &mut [ReservationEntity], now: NaiveDateTime) -> Vec<String> {
        let mut expired = vec![];
        for reservation in pending.iter_mut() {
            if !reservation.reservation_status.holds_slot() || !reservation.is_expired(now) {
                continue;
            }
            reservation.reservation_status = ReservationStatus::Expired;
            reservation.updated_at = now;
            if item.held_for.as_deref() == Some(reservation.reservation_id.as_str()) {
                item.held_for = None;
            }
            expired.push(reservation.reservation_id.to_string());
        }
        if !expired.is_empty() {
            debug!("expired reservations {:?} on item {}", expired, item.item_id);
            item.updated_at = now;
        }
        sync_slot(item, pending);
        expired
    }

    // Picks the oldest eligible reservation: Reserved and not expired, ordered by request
    // time then sequence.
    pub fn select_next(&self, pending: &[ReservationEntity], now: NaiveDateTime) -> Option<usize> {
        pending.iter().enumerate()
            .filter(|(_, r)| r.reservation_status == ReservationStatus::Reserved && !r.is_expired(now))
            .min_by(|(_, a), (_, b)| a.reservation_at.cmp(&b.reservation_at).then(a.sequence.cmp(&b.sequence)))
            .map(|(i, _)| i)
    }

    // Moves the next eligible reservation to Wait and binds the item to it. Nothing is
    // promoted while the item is on loan or already held.
    pub fn promote_next(&self, item: &mut ItemEntity, pending: &mut [ReservationEntity], now: NaiveDateTime) -> Option<String> {
        if item.is_on_loan() || item.is_held() {
            return None;
        }
        if pending.iter().any(|r| r.reservation_status == ReservationStatus::Wait && !r.is_expired(now)) {
            return None;
        }
        let next = self.select_next(pending, now)?;
        let reservation = &mut pending[next];
        reservation.reservation_status = ReservationStatus::Wait;
        reservation.ready_at = Some(now);
        reservation.expires_at = Some(now + self.hold_window);
        reservation.updated_at = now;
        item.held_for = Some(reservation.reservation_id.to_string());
        item.active_reservation_id = Some(reservation.reservation_id.to_string());
        item.updated_at = now;
        debug!("promoted reservation {} on item {} until {:?}",
            reservation.reservation_id, item.item_id, reservation.expires_at);
        Some(reservation.reservation_id.to_string())
    }

    // Lazy expiry followed by promotion of the next eligible reservation.
    pub fn settle(&self, item: &mut ItemEntity, pending: &mut [ReservationEntity], now: NaiveDateTime) -> Settlement {
        let expired = self.settle_expired(item, pending, now);
        let promoted = self.promote_next(item, pending, now);
        sync_slot(item, pending);
        Settlement { expired, promoted }
    }

    pub fn check_issuable(&self, reservation: &ReservationEntity, now: NaiveDateTime) -> LibraryResult<()> {
        if reservation.reservation_status == ReservationStatus::Expired {
            return Err(LibraryError::expired(
                format!("reservation {} expired at {:?}", reservation.reservation_id, reservation.expires_at).as_str()));
        }
        if reservation.reservation_status != ReservationStatus::Wait {
            return Err(LibraryError::invalid_state(
                format!("reservation {} is {}, not ready for pickup",
                        reservation.reservation_id, reservation.reservation_status).as_str()));
        }
        if reservation.expires_at.map_or(false, |expires_at| now > expires_at) {
            return Err(LibraryError::expired(
                format!("reservation {} expired at {:?}", reservation.reservation_id, reservation.expires_at).as_str()));
        }
        Ok(())
    }

    pub fn complete(&self, item: &mut ItemEntity, reservation: &mut ReservationEntity, loan_id: &str, now: NaiveDateTime) {
        reservation.reservation_status = ReservationStatus::Complete;
        reservation.completed_at = Some(now);
        reservation.loan_id = Some(loan_id.to_string());
        reservation.updated_at = now;
        if item.active_reservation_id.as_deref() == Some(reservation.reservation_id.as_str()) {
            item.active_reservation_id = None;
        }
        if item.held_for.as_deref() == Some(reservation.reservation_id.as_str()) {
            item.held_for = None;
        }
        item.updated_at = now;
    }

    // Cancels a Reserved hold, or a Wait hold when the policy allows it. Returns true
    // when the item was released from a Wait hold.
    pub fn cancel(&self, item: &mut ItemEntity, reservation: &mut ReservationEntity,
                  policy: WaitCancelPolicy, now: NaiveDateTime) -> LibraryResult<bool> {
        let released = match reservation.reservation_status {
            ReservationStatus::Reserved => false,
            ReservationStatus::Wait if policy != WaitCancelPolicy::Reject => true,
            other => {
                return Err(LibraryError::invalid_state(
                    format!("reservation {} is {} and cannot be cancelled", reservation.reservation_id, other).as_str()));
            }
        };
        reservation.reservation_status = ReservationStatus::Cancelled;
        reservation.expires_at = None;
        reservation.cancelled_at = Some(now);
        reservation.updated_at = now;
        if item.held_for.as_deref() == Some(reservation.reservation_id.as_str()) {
            item.held_for = None;
        }
        if item.active_reservation_id.as_deref() == Some(reservation.reservation_id.as_str()) {
            item.active_reservation_id = None;
        }
        item.updated_at = now;
        Ok(released)
    }

    // Cancels pending[idx] and promotes the next reservation, except when the policy
    // leaves an item released from a Wait hold idle.
    pub fn withdraw(&self, item: &mut ItemEntity, pending: &mut [ReservationEntity], idx: usize,
                    policy: WaitCancelPolicy, now: NaiveDateTime) -> LibraryResult<(bool, Option<String>)> {
        let released = self.cancel(item, &mut pending[idx], policy, now)?;
        let promoted = if released && policy == WaitCancelPolicy::Cancel {
            None
        } else {
            self.promote_next(item, pending, now)
        };
        Ok((released, promoted))
    }
}

fn sync_slot(item: &mut ItemEntity, pending: &[ReservationEntity]) {
    item.active_reservation_id = pending.iter()
        .find(|r| r.reservation_status.holds_slot())
        .map(|r| r.reservation_id.to_string());
}
