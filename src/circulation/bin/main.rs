use axum::{
    routing::post,
    Router,
};
use lambda_http::{run, Error};
use lms_circulation::circulation::controller::{borrow_item, cancel_reservation, expire_sweep, get_item,
                                               issue_from_wait, query_loans, register_item, reserve_item, return_loan};
use lms_circulation::core::controller::AppState;
use lms_circulation::core::repository::RepositoryStore;
use lms_circulation::inventory::controller::{claim_stock, release_stock, stock_item};
use lms_circulation::utils::ddb::setup_tracing;

const DEV_MODE: bool = true;

#[tokio::main]
async fn main() -> Result<(), Error> {
    setup_tracing();

    let state = if DEV_MODE {
        std::env::set_var("AWS_LAMBDA_FUNCTION_NAME", "_");
        std::env::set_var("AWS_LAMBDA_FUNCTION_MEMORY_SIZE", "4096");
        std::env::set_var("AWS_LAMBDA_FUNCTION_VERSION", "1");
        std::env::set_var("AWS_LAMBDA_RUNTIME_API", "http://[::]:9000/.rt");
        AppState::new("dev", RepositoryStore::LocalDynamoDB).await
    } else {
        AppState::new("prod", RepositoryStore::DynamoDB).await
    };

    let app = Router::new()
        .route("/items", post(register_item))
        .route("/items/get", post(get_item))
        .route("/loans", post(borrow_item))
        .route("/loans/return", post(return_loan))
        .route("/reservations", post(reserve_item))
        .route("/reservations/cancel", post(cancel_reservation))
        .route("/reservations/issue", post(issue_from_wait))
        .route("/reservations/sweep", post(expire_sweep))
        .route("/reports", post(query_loans))
        .route("/inventory/stock", post(stock_item))
        .route("/inventory/claim", post(claim_stock))
        .route("/inventory/release", post(release_stock))
        .with_state(state);

    run(app).await
}
