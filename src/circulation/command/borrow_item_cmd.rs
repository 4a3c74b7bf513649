use std::sync::Arc;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::circulation::domain::CirculationService;
use crate::core::command::{Command, CommandError, request_time};
use crate::loans::dto::LoanDto;
use crate::utils::date::opt_serializer;

pub struct BorrowItemCommand {
    circulation_service: Arc<dyn CirculationService>,
}

impl BorrowItemCommand {
    pub fn new(circulation_service: Arc<dyn CirculationService>) -> Self {
        Self {
            circulation_service,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BorrowItemCommandRequest {
    item_id: String,
    borrower_id: String,
    // loan start, defaults to now
    #[serde(with = "opt_serializer", default)]
    as_of: Option<NaiveDateTime>,
    #[serde(with = "opt_serializer", default)]
    now: Option<NaiveDateTime>,
}

impl BorrowItemCommandRequest {
    pub fn new(item_id: &str, borrower_id: &str, as_of: Option<NaiveDateTime>, now: Option<NaiveDateTime>) -> Self {
        Self {
            item_id: item_id.to_string(),
            borrower_id: borrower_id.to_string(),
            as_of,
            now,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BorrowItemCommandResponse {
    pub loan: LoanDto,
}

impl BorrowItemCommandResponse {
    pub fn new(loan: LoanDto) -> Self {
        Self {
            loan,
        }
    }
}

#[async_trait]
impl Command<BorrowItemCommandRequest, BorrowItemCommandResponse> for BorrowItemCommand {
    async fn execute(&self, req: BorrowItemCommandRequest) -> Result<BorrowItemCommandResponse, CommandError> {
        let now = request_time(req.now);
        self.circulation_service.borrow(req.item_id.as_str(), req.borrower_id.as_str(), req.as_of.unwrap_or(now), now)
            .await.map_err(CommandError::from).map(BorrowItemCommandResponse::new)
    }
}
