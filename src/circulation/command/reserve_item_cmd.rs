use std::sync::Arc;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::circulation::domain::CirculationService;
use crate::core::command::{Command, CommandError, request_time};
use crate::reservations::dto::ReservationDto;
use crate::utils::date::opt_serializer;

pub struct ReserveItemCommand {
    circulation_service: Arc<dyn CirculationService>,
}

impl ReserveItemCommand {
    pub fn new(circulation_service: Arc<dyn CirculationService>) -> Self {
        Self {
            circulation_service,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReserveItemCommandRequest {
    item_id: String,
    borrower_id: String,
    #[serde(with = "opt_serializer", default)]
    now: Option<NaiveDateTime>,
}

impl ReserveItemCommandRequest {
    pub fn new(item_id: &str, borrower_id: &str, now: Option<NaiveDateTime>) -> Self {
        Self {
            item_id: item_id.to_string(),
            borrower_id: borrower_id.to_string(),
            now,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReserveItemCommandResponse {
    pub reservation: ReservationDto,
}

impl ReserveItemCommandResponse {
    pub fn new(reservation: ReservationDto) -> Self {
        Self {
            reservation,
        }
    }
}

#[async_trait]
impl Command<ReserveItemCommandRequest, ReserveItemCommandResponse> for ReserveItemCommand {
    async fn execute(&self, req: ReserveItemCommandRequest) -> Result<ReserveItemCommandResponse, CommandError> {
        self.circulation_service.reserve(req.item_id.as_str(), req.borrower_id.as_str(), request_time(req.now))
            .await.map_err(CommandError::from).map(ReserveItemCommandResponse::new)
    }
}
