use std::sync::Arc;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::circulation::domain::CirculationService;
use crate::circulation::dto::CancelDto;
use crate::core::command::{Command, CommandError, request_time};
use crate::utils::date::opt_serializer;

pub struct CancelReservationCommand {
    circulation_service: Arc<dyn CirculationService>,
}

impl CancelReservationCommand {
    pub fn new(circulation_service: Arc<dyn CirculationService>) -> Self {
        Self {
            circulation_service,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CancelReservationCommandRequest {
    reservation_id: String,
    #[serde(with = "opt_serializer", default)]
    now: Option<NaiveDateTime>,
}

impl CancelReservationCommandRequest {
    pub fn new(reservation_id: &str, now: Option<NaiveDateTime>) -> Self {
        Self {
            reservation_id: reservation_id.to_string(),
            now,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CancelReservationCommandResponse {
    pub cancelled: CancelDto,
}

impl CancelReservationCommandResponse {
    pub fn new(cancelled: CancelDto) -> Self {
        Self {
            cancelled,
        }
    }
}

#[async_trait]
impl Command<CancelReservationCommandRequest, CancelReservationCommandResponse> for CancelReservationCommand {
    async fn execute(&self, req: CancelReservationCommandRequest) -> Result<CancelReservationCommandResponse, CommandError> {
        self.circulation_service.cancel_reservation(req.reservation_id.as_str(), request_time(req.now))
            .await.map_err(CommandError::from).map(CancelReservationCommandResponse::new)
    }
}
