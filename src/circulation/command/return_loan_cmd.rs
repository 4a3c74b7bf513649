use std::sync::Arc;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::circulation::domain::CirculationService;
use crate::circulation::dto::ReturnDto;
use crate::core::command::{Command, CommandError, request_time};
use crate::utils::date::opt_serializer;

pub struct ReturnLoanCommand {
    circulation_service: Arc<dyn CirculationService>,
}

impl ReturnLoanCommand {
    pub fn new(circulation_service: Arc<dyn CirculationService>) -> Self {
        Self {
            circulation_service,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReturnLoanCommandRequest {
    loan_id: String,
    #[serde(with = "opt_serializer", default)]
    now: Option<NaiveDateTime>,
}

impl ReturnLoanCommandRequest {
    pub fn new(loan_id: &str, now: Option<NaiveDateTime>) -> Self {
        Self {
            loan_id: loan_id.to_string(),
            now,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReturnLoanCommandResponse {
    pub returned: ReturnDto,
}

impl ReturnLoanCommandResponse {
    pub fn new(returned: ReturnDto) -> Self {
        Self {
            returned,
        }
    }
}

#[async_trait]
impl Command<ReturnLoanCommandRequest, ReturnLoanCommandResponse> for ReturnLoanCommand {
    async fn execute(&self, req: ReturnLoanCommandRequest) -> Result<ReturnLoanCommandResponse, CommandError> {
        self.circulation_service.return_loan(req.loan_id.as_str(), request_time(req.now))
            .await.map_err(CommandError::from).map(ReturnLoanCommandResponse::new)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};
    use crate::circulation::command::return_loan_cmd::{ReturnLoanCommand, ReturnLoanCommandRequest};
    use crate::circulation::factory::{create_circulation_service, create_circulation_store};
    use crate::core::command::{Command, CommandError};
    use crate::core::domain::Configuration;
    use crate::core::library::LoanStatus;
    use crate::core::repository::RepositoryStore;

    #[tokio::test]
    async fn test_should_run_return_loan() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let store = create_circulation_store(RepositoryStore::Memory).await;
        let svc = create_circulation_service(&Configuration::new("test"), RepositoryStore::Memory, store).await;
        let _ = svc.register_item("42", "Dune", true, now).await.expect("should register");
        let loan = svc.borrow("42", "7", now, now).await.expect("should borrow");
        let cmd = ReturnLoanCommand::new(svc);

        let later = now + Duration::days(16);
        let res = cmd.execute(ReturnLoanCommandRequest::new(loan.loan_id.as_str(), Some(later))).await.expect("should return");
        assert_eq!(LoanStatus::Overdue, res.returned.loan.loan_status);
        assert_eq!(2, res.returned.overdue_days);
        assert!(res.returned.item.available);
        let res = cmd.execute(ReturnLoanCommandRequest::new(loan.loan_id.as_str(), Some(later))).await;
        assert!(matches!(res, Err(CommandError::InvalidState { .. })));
    }
}
