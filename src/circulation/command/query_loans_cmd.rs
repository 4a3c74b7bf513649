use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::circulation::domain::CirculationService;
use crate::core::command::{Command, CommandError, request_time};
use crate::core::library::PaginatedResult;
use crate::loans::dto::LoanDto;
use crate::reservations::dto::ReservationDto;
use crate::utils::date::opt_serializer;

const DEFAULT_PAGE_SIZE: usize = 50;

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

// QueryLoansCommand serves the read-only reporting queries over loans and reservations
pub struct QueryLoansCommand {
    circulation_service: Arc<dyn CirculationService>,
}

impl QueryLoansCommand {
    pub fn new(circulation_service: Arc<dyn CirculationService>) -> Self {
        Self {
            circulation_service,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub enum QueryKind {
    Loans,
    Overdue,
    Reservations,
}

#[derive(Debug, Deserialize)]
pub struct QueryLoansCommandRequest {
    kind: QueryKind,
    #[serde(default)]
    predicate: HashMap<String, String>,
    #[serde(default)]
    page: Option<String>,
    #[serde(default = "default_page_size")]
    page_size: usize,
    #[serde(with = "opt_serializer", default)]
    now: Option<NaiveDateTime>,
}

impl QueryLoansCommandRequest {
    pub fn new(kind: QueryKind, predicate: HashMap<String, String>, page: Option<&str>,
               page_size: usize, now: Option<NaiveDateTime>) -> Self {
        Self {
            kind,
            predicate,
            page: page.map(str::to_string),
            page_size,
            now,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QueryLoansCommandResponse {
    pub loans: Option<PaginatedResult<LoanDto>>,
    pub reservations: Option<PaginatedResult<ReservationDto>>,
}

#[async_trait]
impl Command<QueryLoansCommandRequest, QueryLoansCommandResponse> for QueryLoansCommand {
    async fn execute(&self, req: QueryLoansCommandRequest) -> Result<QueryLoansCommandResponse, CommandError> {
        let page = req.page.as_deref();
        let res = match req.kind {
            QueryKind::Loans => {
                self.circulation_service.query_loans(&req.predicate, page, req.page_size).await
                    .map(|loans| QueryLoansCommandResponse { loans: Some(loans), reservations: None })
            }
            QueryKind::Overdue => {
                self.circulation_service.query_overdue(request_time(req.now), page, req.page_size).await
                    .map(|loans| QueryLoansCommandResponse { loans: Some(loans), reservations: None })
            }
            QueryKind::Reservations => {
                self.circulation_service.query_reservations(&req.predicate, page, req.page_size).await
                    .map(|reservations| QueryLoansCommandResponse { loans: None, reservations: Some(reservations) })
            }
        };
        res.map_err(CommandError::from)
    }
}
