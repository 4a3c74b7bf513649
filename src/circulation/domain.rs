use std::collections::HashMap;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use crate::circulation::dto::{CancelDto, IssueDto, ReturnDto, SweepDto};
use crate::core::library::{LibraryResult, PaginatedResult};
use crate::items::dto::ItemDto;
use crate::loans::dto::LoanDto;
use crate::reservations::dto::ReservationDto;

pub mod service;

// CirculationService is the public surface of circulation. Every mutating operation
// takes `now` explicitly and runs as one atomic unit of work per item.
#[async_trait]
pub trait CirculationService: Sync + Send {
    async fn register_item(&self, item_id: &str, title: &str, borrowable: bool, now: NaiveDateTime) -> LibraryResult<ItemDto>;
    async fn find_item(&self, item_id: &str) -> LibraryResult<ItemDto>;
    async fn borrow(&self, item_id: &str, borrower_id: &str, as_of: NaiveDateTime, now: NaiveDateTime) -> LibraryResult<LoanDto>;
    async fn return_loan(&self, loan_id: &str, now: NaiveDateTime) -> LibraryResult<ReturnDto>;
    async fn reserve(&self, item_id: &str, borrower_id: &str, now: NaiveDateTime) -> LibraryResult<ReservationDto>;
    async fn cancel_reservation(&self, reservation_id: &str, now: NaiveDateTime) -> LibraryResult<CancelDto>;
    async fn issue_from_wait(&self, reservation_id: &str, borrower_override: Option<&str>,
                             now: NaiveDateTime) -> LibraryResult<IssueDto>;
    async fn expire_sweep(&self, now: NaiveDateTime) -> LibraryResult<SweepDto>;
    async fn find_loan(&self, loan_id: &str) -> LibraryResult<LoanDto>;
    async fn find_reservation(&self, reservation_id: &str) -> LibraryResult<ReservationDto>;
    async fn query_loans(&self, predicate: &HashMap<String, String>,
                         page: Option<&str>, page_size: usize) -> LibraryResult<PaginatedResult<LoanDto>>;
    async fn query_overdue(&self, now: NaiveDateTime,
                           page: Option<&str>, page_size: usize) -> LibraryResult<PaginatedResult<LoanDto>>;
    async fn query_reservations(&self, predicate: &HashMap<String, String>,
                                page: Option<&str>, page_size: usize) -> LibraryResult<PaginatedResult<ReservationDto>>;
}
