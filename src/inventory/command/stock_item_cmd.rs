use std::sync::Arc;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::core::command::{Command, CommandError, request_time};
use crate::inventory::domain::InventoryService;
use crate::inventory::dto::InventoryCounterDto;
use crate::utils::date::opt_serializer;

pub struct StockItemCommand {
    inventory_service: Arc<dyn InventoryService>,
}

impl StockItemCommand {
    pub fn new(inventory_service: Arc<dyn InventoryService>) -> Self {
        Self {
            inventory_service,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StockItemCommandRequest {
    item_id: String,
    location_id: String,
    // copies added (or withdrawn when negative)
    on_hand_delta: i64,
    #[serde(with = "opt_serializer", default)]
    now: Option<NaiveDateTime>,
}

impl StockItemCommandRequest {
    pub fn new(item_id: &str, location_id: &str, on_hand_delta: i64, now: Option<NaiveDateTime>) -> Self {
        Self {
            item_id: item_id.to_string(),
            location_id: location_id.to_string(),
            on_hand_delta,
            now,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StockItemCommandResponse {
    pub counter: InventoryCounterDto,
}

impl StockItemCommandResponse {
    pub fn new(counter: InventoryCounterDto) -> Self {
        Self {
            counter,
        }
    }
}

#[async_trait]
impl Command<StockItemCommandRequest, StockItemCommandResponse> for StockItemCommand {
    async fn execute(&self, req: StockItemCommandRequest) -> Result<StockItemCommandResponse, CommandError> {
        self.inventory_service.stock(req.item_id.as_str(), req.location_id.as_str(), req.on_hand_delta, request_time(req.now))
            .await.map_err(CommandError::from).map(StockItemCommandResponse::new)
    }
}

#[cfg(test)]
mod tests {
    use crate::circulation::factory::create_circulation_store;
    use crate::core::command::{Command, CommandError};
    use crate::core::domain::Configuration;
    use crate::core::repository::RepositoryStore;
    use crate::inventory::command::stock_item_cmd::{StockItemCommand, StockItemCommandRequest};
    use crate::inventory::factory::create_inventory_service;

    #[tokio::test]
    async fn test_should_run_stock_item() {
        let store = create_circulation_store(RepositoryStore::Memory).await;
        let svc = create_inventory_service(&Configuration::new("test"), RepositoryStore::Memory, store).await;
        let cmd = StockItemCommand::new(svc);
        let res = cmd.execute(StockItemCommandRequest::new("42", "main", 2, None)).await.expect("should stock");
        assert_eq!(2, res.counter.available);
        let res = cmd.execute(StockItemCommandRequest::new("42", "main", -3, None)).await;
        assert!(matches!(res, Err(CommandError::InsufficientStock { .. })));
    }
}
