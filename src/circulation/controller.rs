use axum::{
    extract::State,
    response::Json,
};
use serde_json::Value;
use crate::circulation::command::borrow_item_cmd::{BorrowItemCommand, BorrowItemCommandRequest, BorrowItemCommandResponse};
use crate::circulation::command::cancel_reservation_cmd::{CancelReservationCommand, CancelReservationCommandRequest, CancelReservationCommandResponse};
use crate::circulation::command::expire_sweep_cmd::{ExpireSweepCommand, ExpireSweepCommandRequest, ExpireSweepCommandResponse};
use crate::circulation::command::get_item_cmd::{GetItemCommand, GetItemCommandRequest, GetItemCommandResponse};
use crate::circulation::command::issue_from_wait_cmd::{IssueFromWaitCommand, IssueFromWaitCommandRequest, IssueFromWaitCommandResponse};
use crate::circulation::command::query_loans_cmd::{QueryLoansCommand, QueryLoansCommandRequest, QueryLoansCommandResponse};
use crate::circulation::command::register_item_cmd::{RegisterItemCommand, RegisterItemCommandRequest, RegisterItemCommandResponse};
use crate::circulation::command::reserve_item_cmd::{ReserveItemCommand, ReserveItemCommandRequest, ReserveItemCommandResponse};
use crate::circulation::command::return_loan_cmd::{ReturnLoanCommand, ReturnLoanCommandRequest, ReturnLoanCommandResponse};
use crate::core::command::Command;
use crate::core::controller::{AppState, json_to_server_error, ServerError};

pub async fn register_item(
    State(state): State<AppState>,
    json: Json<Value>) -> Result<Json<RegisterItemCommandResponse>, ServerError> {
    let req: RegisterItemCommandRequest = serde_json::from_value(json.0).map_err(json_to_server_error)?;
    let res = RegisterItemCommand::new(state.circulation).execute(req).await?;
    Ok(Json(res))
}

pub async fn get_item(
    State(state): State<AppState>,
    json: Json<Value>) -> Result<Json<GetItemCommandResponse>, ServerError> {
    let req: GetItemCommandRequest = serde_json::from_value(json.0).map_err(json_to_server_error)?;
    let res = GetItemCommand::new(state.circulation).execute(req).await?;
    Ok(Json(res))
}

pub async fn borrow_item(
    State(state): State<AppState>,
    json: Json<Value>) -> Result<Json<BorrowItemCommandResponse>, ServerError> {
    let req: BorrowItemCommandRequest = serde_json::from_value(json.0).map_err(json_to_server_error)?;
    let res = BorrowItemCommand::new(state.circulation).execute(req).await?;
    Ok(Json(res))
}

pub async fn return_loan(
    State(state): State<AppState>,
    json: Json<Value>) -> Result<Json<ReturnLoanCommandResponse>, ServerError> {
    let req: ReturnLoanCommandRequest = serde_json::from_value(json.0).map_err(json_to_server_error)?;
    let res = ReturnLoanCommand::new(state.circulation).execute(req).await?;
    Ok(Json(res))
}

pub async fn reserve_item(
    State(state): State<AppState>,
    json: Json<Value>) -> Result<Json<ReserveItemCommandResponse>, ServerError> {
    let req: ReserveItemCommandRequest = serde_json::from_value(json.0).map_err(json_to_server_error)?;
    let res = ReserveItemCommand::new(state.circulation).execute(req).await?;
    Ok(Json(res))
}

pub async fn cancel_reservation(
    State(state): State<AppState>,
    json: Json<Value>) -> Result<Json<CancelReservationCommandResponse>, ServerError> {
    let req: CancelReservationCommandRequest = serde_json::from_value(json.0).map_err(json_to_server_error)?;
    let res = CancelReservationCommand::new(state.circulation).execute(req).await?;
    Ok(Json(res))
}

pub async fn issue_from_wait(
    State(state): State<AppState>,
    json: Json<Value>) -> Result<Json<IssueFromWaitCommandResponse>, ServerError> {
    let req: IssueFromWaitCommandRequest = serde_json::from_value(json.0).map_err(json_to_server_error)?;
    let res = IssueFromWaitCommand::new(state.circulation).execute(req).await?;
    Ok(Json(res))
}

pub async fn expire_sweep(
    State(state): State<AppState>,
    json: Json<Value>) -> Result<Json<ExpireSweepCommandResponse>, ServerError> {
    let req: ExpireSweepCommandRequest = serde_json::from_value(json.0).map_err(json_to_server_error)?;
    let res = ExpireSweepCommand::new(state.circulation).execute(req).await?;
    Ok(Json(res))
}

pub async fn query_loans(
    State(state): State<AppState>,
    json: Json<Value>) -> Result<Json<QueryLoansCommandResponse>, ServerError> {
    let req: QueryLoansCommandRequest = serde_json::from_value(json.0).map_err(json_to_server_error)?;
    let res = QueryLoansCommand::new(state.circulation).execute(req).await?;
    Ok(Json(res))
}

#[cfg(test)]
mod tests {
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::response::Json;
    use serde_json::json;
    use crate::circulation::controller::{borrow_item, register_item, return_loan};
    use crate::core::controller::AppState;
    use crate::core::repository::RepositoryStore;

    #[tokio::test]
    async fn test_should_handle_borrow_and_return() {
        let state = AppState::new("test", RepositoryStore::Memory).await;
        let _ = register_item(State(state.clone()), Json(json!({"item_id": "42", "title": "Dune"})))
            .await.expect("should register");
        let loan = borrow_item(State(state.clone()), Json(json!({"item_id": "42", "borrower_id": "7",
            "now": "2030-03-01T09:00:00"}))).await.expect("should borrow");
        let loan_id = loan.0.loan.loan_id.clone();

        let err = borrow_item(State(state.clone()), Json(json!({"item_id": "42", "borrower_id": "8"})))
            .await.expect_err("should be on loan");
        assert_eq!(StatusCode::CONFLICT, err.0);
        let err = borrow_item(State(state.clone()), Json(json!({"item_id": 42})))
            .await.expect_err("should reject request");
        assert_eq!(StatusCode::BAD_REQUEST, err.0);

        let returned = return_loan(State(state.clone()), Json(json!({"loan_id": loan_id, "now": "2030-03-02T09:00:00"})))
            .await.expect("should return");
        assert!(returned.0.returned.item.available);
    }
}
