use std::sync::Arc;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::circulation::domain::CirculationService;
use crate::circulation::dto::SweepDto;
use crate::core::command::{Command, CommandError, request_time};
use crate::utils::date::opt_serializer;

// ExpireSweepCommand is the entry point for scheduler-driven expiry
pub struct ExpireSweepCommand {
    circulation_service: Arc<dyn CirculationService>,
}

impl ExpireSweepCommand {
    pub fn new(circulation_service: Arc<dyn CirculationService>) -> Self {
        Self {
            circulation_service,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ExpireSweepCommandRequest {
    #[serde(with = "opt_serializer", default)]
    now: Option<NaiveDateTime>,
}

impl ExpireSweepCommandRequest {
    pub fn new(now: Option<NaiveDateTime>) -> Self {
        Self {
            now,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExpireSweepCommandResponse {
    pub sweep: SweepDto,
}

impl ExpireSweepCommandResponse {
    pub fn new(sweep: SweepDto) -> Self {
        Self {
            sweep,
        }
    }
}

#[async_trait]
impl Command<ExpireSweepCommandRequest, ExpireSweepCommandResponse> for ExpireSweepCommand {
    async fn execute(&self, req: ExpireSweepCommandRequest) -> Result<ExpireSweepCommandResponse, CommandError> {
        self.circulation_service.expire_sweep(request_time(req.now))
            .await.map_err(CommandError::from).map(ExpireSweepCommandResponse::new)
    }
}
