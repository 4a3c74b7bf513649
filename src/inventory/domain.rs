use async_trait::async_trait;
use chrono::NaiveDateTime;
use crate::core::library::LibraryResult;
use crate::inventory::dto::InventoryCounterDto;

pub mod ledger;
pub mod model;
pub mod service;

// InventoryService maintains per-location copy counters for the multi-copy model
#[async_trait]
pub trait InventoryService: Sync + Send {
    async fn stock(&self, item_id: &str, location_id: &str, on_hand_delta: i64,
                   now: NaiveDateTime) -> LibraryResult<InventoryCounterDto>;
    async fn find_counter(&self, item_id: &str, location_id: &str) -> LibraryResult<InventoryCounterDto>;
    async fn claim(&self, item_id: &str, location_id: &str, expected_version: i64,
                   now: NaiveDateTime) -> LibraryResult<InventoryCounterDto>;
    async fn release(&self, item_id: &str, location_id: &str, expected_version: i64,
                     now: NaiveDateTime) -> LibraryResult<InventoryCounterDto>;
    async fn claim_latest(&self, item_id: &str, location_id: &str, now: NaiveDateTime) -> LibraryResult<InventoryCounterDto>;
    async fn release_latest(&self, item_id: &str, location_id: &str, now: NaiveDateTime) -> LibraryResult<InventoryCounterDto>;
}
