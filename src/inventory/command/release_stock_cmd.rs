use std::sync::Arc;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::core::command::{Command, CommandError, request_time};
use crate::inventory::domain::InventoryService;
use crate::inventory::dto::InventoryCounterDto;
use crate::utils::date::opt_serializer;

pub struct ReleaseStockCommand {
    inventory_service: Arc<dyn InventoryService>,
}

impl ReleaseStockCommand {
    pub fn new(inventory_service: Arc<dyn InventoryService>) -> Self {
        Self {
            inventory_service,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReleaseStockCommandRequest {
    item_id: String,
    location_id: String,
    // without a version the latest counter is re-read on conflict
    #[serde(default)]
    expected_version: Option<i64>,
    #[serde(with = "opt_serializer", default)]
    now: Option<NaiveDateTime>,
}

impl ReleaseStockCommandRequest {
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
pub struct ReleaseStockCommandResponse {
    pub counter: InventoryCounterDto,
}

impl ReleaseStockCommandResponse {
    pub fn new(counter: InventoryCounterDto) -> Self {
        Self {
            counter,
        }
    }
}

#[async_trait]
impl Command<ReleaseStockCommandRequest, ReleaseStockCommandResponse> for ReleaseStockCommand {
    async fn execute(&self, req: ReleaseStockCommandRequest) -> Result<ReleaseStockCommandResponse, CommandError> {
        let now = request_time(req.now);
        let res = match req.expected_version {
            Some(version) => self.inventory_service.release(req.item_id.as_str(), req.location_id.as_str(), version, now).await,
            None => self.inventory_service.release_latest(req.item_id.as_str(), req.location_id.as_str(), now).await,
        };
        res.map_err(CommandError::from).map(ReleaseStockCommandResponse::new)
    }
}
