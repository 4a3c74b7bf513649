use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use tracing::{info, warn};
use crate::circulation::repository::{CirculationStore, UnitOfWork};
use crate::core::domain::Configuration;
use crate::core::events::{DomainEvent, INVENTORY_UPDATED};
use crate::core::library::{LibraryError, LibraryResult};
use crate::core::retry::RetryPolicy;
use crate::gateway::events::EventPublisher;
use crate::inventory::domain::InventoryService;
use crate::inventory::domain::ledger::InventoryLedger;
use crate::inventory::domain::model::{checked_counter_id, InventoryCounterEntity};
use crate::inventory::dto::InventoryCounterDto;

pub struct InventoryServiceImpl {
    ledger: InventoryLedger,
    retry: RetryPolicy,
    store: Arc<dyn CirculationStore>,
    events_publisher: Box<dyn EventPublisher>,
}

impl InventoryServiceImpl {
    pub fn new(config: &Configuration, store: Arc<dyn CirculationStore>,
               events_publisher: Box<dyn EventPublisher>) -> Self {
        Self {
            ledger: InventoryLedger::new(),
            retry: RetryPolicy::from_config(config),
            store,
            events_publisher,
        }
    }

    async fn commit(&self, counter: &mut InventoryCounterEntity, action: &str, now: NaiveDateTime) -> LibraryResult<InventoryCounterDto> {
        let mut uow = UnitOfWork::new();
        uow.update_counter(counter);
        self.store.commit(uow).await?;
        let counter = InventoryCounterDto::from(&*counter);
        info!("{} counter {} on_hand={} reserved={}", action, counter.counter_id, counter.on_hand, counter.reserved);
        self.publish(&counter, action, now).await;
        Ok(counter)
    }

    async fn publish(&self, counter: &InventoryCounterDto, action: &str, now: NaiveDateTime) {
        let metadata = HashMap::from([
            ("item_id".to_string(), counter.item_id.to_string()),
            ("location_id".to_string(), counter.location_id.to_string()),
            ("action".to_string(), action.to_string())]);
        match DomainEvent::updated(INVENTORY_UPDATED, "inventory", counter.counter_id.as_str(), &metadata, counter, now) {
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

    async fn try_stock(&self, item_id: &str, location_id: &str, on_hand_delta: i64, now: NaiveDateTime) -> LibraryResult<InventoryCounterDto> {
        match self.store.get_counter(checked_counter_id(item_id, location_id)?.as_str()).await {
            Ok(mut counter) => {
                self.ledger.adjust_on_hand(&mut counter, on_hand_delta, now)?;
                self.commit(&mut counter, "stock", now).await
            }
            Err(LibraryError::NotFound { .. }) => {
                let mut counter = InventoryCounterEntity::new(item_id, location_id, now);
                self.ledger.adjust_on_hand(&mut counter, on_hand_delta, now)?;
                let mut uow = UnitOfWork::new();
                uow.insert_counter(&counter);
                // lost the race to create the counter, adjust the winner's instead
                self.store.commit(uow).await.map_err(|err| match err {
                    LibraryError::DuplicateKey { message } => LibraryError::concurrency_conflict(message.as_str()),
                    other => other,
                })?;
                let counter = InventoryCounterDto::from(&counter);
                info!("created counter {} on_hand={}", counter.counter_id, counter.on_hand);
                self.publish(&counter, "stock", now).await;
                Ok(counter)
            }
            Err(err) => Err(err),
        }
    }

    async fn try_claim(&self, item_id: &str, location_id: &str, expected_version: Option<i64>,
                       now: NaiveDateTime) -> LibraryResult<InventoryCounterDto> {
        let mut counter = self.store.get_counter(checked_counter_id(item_id, location_id)?.as_str()).await?;
        let expected_version = expected_version.unwrap_or(counter.version);
        self.ledger.claim(&mut counter, expected_version, now)?;
        self.commit(&mut counter, "claim", now).await
    }

    async fn try_release(&self, item_id: &str, location_id: &str, expected_version: Option<i64>,
                         now: NaiveDateTime) -> LibraryResult<InventoryCounterDto> {
        let mut counter = self.store.get_counter(checked_counter_id(item_id, location_id)?.as_str()).await?;
        let expected_version = expected_version.unwrap_or(counter.version);
        self.ledger.release(&mut counter, expected_version, now)?;
        self.commit(&mut counter, "release", now).await
    }
}

#[async_trait]
impl InventoryService for InventoryServiceImpl {
    async fn stock(&self, item_id: &str, location_id: &str, on_hand_delta: i64,
                   now: NaiveDateTime) -> LibraryResult<InventoryCounterDto> {
        self.retry.run("stock", move || self.try_stock(item_id, location_id, on_hand_delta, now)).await
    }

    async fn find_counter(&self, item_id: &str, location_id: &str) -> LibraryResult<InventoryCounterDto> {
        self.store.get_counter(checked_counter_id(item_id, location_id)?.as_str()).await
            .map(|counter| InventoryCounterDto::from(&counter))
    }

    // the caller holds the version, a conflict is theirs to resolve
    async fn claim(&self, item_id: &str, location_id: &str, expected_version: i64,
                   now: NaiveDateTime) -> LibraryResult<InventoryCounterDto> {
        self.try_claim(item_id, location_id, Some(expected_version), now).await
    }

    async fn release(&self, item_id: &str, location_id: &str, expected_version: i64,
                     now: NaiveDateTime) -> LibraryResult<InventoryCounterDto> {
        self.try_release(item_id, location_id, Some(expected_version), now).await
    }

    async fn claim_latest(&self, item_id: &str, location_id: &str, now: NaiveDateTime) -> LibraryResult<InventoryCounterDto> {
        self.retry.run("claim_latest", move || self.try_claim(item_id, location_id, None, now)).await
    }

    async fn release_latest(&self, item_id: &str, location_id: &str, now: NaiveDateTime) -> LibraryResult<InventoryCounterDto> {
        self.retry.run("release_latest", move || self.try_release(item_id, location_id, None, now)).await
    }
}
