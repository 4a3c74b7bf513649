use std::sync::Arc;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::core::command::{Command, CommandError, request_time};
use crate::inventory::domain::InventoryService;
use crate::inventory::dto::InventoryCounterDto;
use crate::utils::date::opt_serializer;

pub struct ClaimStockCommand {
    inventory_service: Arc<dyn InventoryService>,
}

impl ClaimStockCommand {
    pub fn new(inventory_service: Arc<dyn InventoryService>) -> Self {
        Self {
            inventory_service,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ClaimStockCommandRequest {
    item_id: String,
    location_id: String,
    // without a version the latest counter is re-read on conflict
    #[serde(default)]
    expected_version: Option<i64>,
    #[serde(with = "opt_serializer", default)]
    now: Option<NaiveDateTime>,
}

impl ClaimStockCommandRequest {
    pub fn new(item_id: &str, location_id: &str, expected_version: Option<i64>, now: Option<NaiveDateTime>) -> Self {
        Self {
            item_id: item_id.to_string(),
            location_id: location_id.to_string(),
            expected_version,
            now,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClaimStockCommandResponse {
    pub counter: InventoryCounterDto,
}

impl ClaimStockCommandResponse {
    pub fn new(counter: InventoryCounterDto) -> Self {
        Self {
            counter,
        }
    }
}

#[async_trait]
impl Command<ClaimStockCommandRequest, ClaimStockCommandResponse> for ClaimStockCommand {
    async fn execute(&self, req: ClaimStockCommandRequest) -> Result<ClaimStockCommandResponse, CommandError> {
        let now = request_time(req.now);
        let res = match req.expected_version {
            Some(version) => self.inventory_service.claim(req.item_id.as_str(), req.location_id.as_str(), version, now).await,
            None => self.inventory_service.claim_latest(req.item_id.as_str(), req.location_id.as_str(), now).await,
        };
        res.map_err(CommandError::from).map(ClaimStockCommandResponse::new)
    }
}

#[cfg(test)]
mod tests {
    use crate::circulation::factory::create_circulation_store;
    use crate::core::command::{Command, CommandError};
    use crate::core::domain::Configuration;
    use crate::core::repository::RepositoryStore;
    use crate::inventory::command::claim_stock_cmd::{ClaimStockCommand, ClaimStockCommandRequest};
    use crate::inventory::factory::create_inventory_service;

    #[tokio::test]
    async fn test_should_run_claim_stock() {
        let store = create_circulation_store(RepositoryStore::Memory).await;
        let svc = create_inventory_service(&Configuration::new("test"), RepositoryStore::Memory, store).await;
        let counter = svc.stock("42", "main", 2, chrono::Utc::now().naive_utc()).await.expect("should stock");
        let cmd = ClaimStockCommand::new(svc);

        let res = cmd.execute(ClaimStockCommandRequest::new("42", "main", Some(counter.version), None)).await.expect("should claim");
        assert_eq!(1, res.counter.reserved);
        let res = cmd.execute(ClaimStockCommandRequest::new("42", "main", Some(counter.version), None)).await;
        assert!(matches!(res, Err(CommandError::ConcurrencyConflict { .. })));
        let res = cmd.execute(ClaimStockCommandRequest::new("42", "main", None, None)).await.expect("should claim");
        assert_eq!(0, res.counter.available);
    }
}
