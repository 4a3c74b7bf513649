use std::sync::Arc;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::circulation::domain::CirculationService;
use crate::circulation::dto::IssueDto;
use crate::core::command::{Command, CommandError, request_time};
use crate::utils::date::opt_serializer;

// IssueFromWaitCommand is the desk operation that hands a held item to its borrower
pub struct IssueFromWaitCommand {
    circulation_service: Arc<dyn CirculationService>,
}

impl IssueFromWaitCommand {
    pub fn new(circulation_service: Arc<dyn CirculationService>) -> Self {
        Self {
            circulation_service,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IssueFromWaitCommandRequest {
    reservation_id: String,
    // lend to someone other than the reservation's borrower
    #[serde(default)]
    borrower_id: Option<String>,
    #[serde(with = "opt_serializer", default)]
    now: Option<NaiveDateTime>,
}

impl IssueFromWaitCommandRequest {
    pub fn new(reservation_id: &str, borrower_id: Option<&str>, now: Option<NaiveDateTime>) -> Self {
        Self {
            reservation_id: reservation_id.to_string(),
            borrower_id: borrower_id.map(str::to_string),
            now,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IssueFromWaitCommandResponse {
    pub issued: IssueDto,
}

impl IssueFromWaitCommandResponse {
    pub fn new(issued: IssueDto) -> Self {
        Self {
            issued,
        }
    }
}

#[async_trait]
impl Command<IssueFromWaitCommandRequest, IssueFromWaitCommandResponse> for IssueFromWaitCommand {
    async fn execute(&self, req: IssueFromWaitCommandRequest) -> Result<IssueFromWaitCommandResponse, CommandError> {
        self.circulation_service.issue_from_wait(req.reservation_id.as_str(), req.borrower_id.as_deref(), request_time(req.now))
            .await.map_err(CommandError::from).map(IssueFromWaitCommandResponse::new)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};
    use crate::circulation::command::issue_from_wait_cmd::{IssueFromWaitCommand, IssueFromWaitCommandRequest};
    use crate::circulation::factory::{create_circulation_service, create_circulation_store};
    use crate::core::command::{Command, CommandError};
    use crate::core::domain::Configuration;
    use crate::core::library::ReservationStatus;
    use crate::core::repository::RepositoryStore;

    #[tokio::test]
    async fn test_should_run_issue_from_wait() {
        let day0 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let store = create_circulation_store(RepositoryStore::Memory).await;
        let svc = create_circulation_service(&Configuration::new("test"), RepositoryStore::Memory, store).await;
        let mut holds = vec![];
        for item_id in ["42", "43"] {
            let _ = svc.register_item(item_id, "Dune", true, day0).await.expect("should register");
            let loan = svc.borrow(item_id, "7", day0, day0).await.expect("should borrow");
            let reservation = svc.reserve(item_id, "9", day0 + Duration::days(1)).await.expect("should reserve");
            let _ = svc.return_loan(loan.loan_id.as_str(), day0 + Duration::days(10)).await.expect("should return");
            holds.push(reservation.reservation_id);
        }
        let cmd = IssueFromWaitCommand::new(svc);

        let res = cmd.execute(IssueFromWaitCommandRequest::new(
            holds[0].as_str(), None, Some(day0 + Duration::days(12)))).await.expect("should issue");
        assert_eq!("9", res.issued.loan.borrower_id.as_str());
        assert_eq!(ReservationStatus::Complete, res.issued.reservation.reservation_status);

        let late = cmd.execute(IssueFromWaitCommandRequest::new(
            holds[1].as_str(), None, Some(day0 + Duration::days(14)))).await;
        assert!(matches!(late, Err(CommandError::Expired { .. })));
    }
}
