pub mod borrow_item_cmd;
pub mod cancel_reservation_cmd;
pub mod expire_sweep_cmd;
pub mod get_item_cmd;
pub mod issue_from_wait_cmd;
pub mod query_loans_cmd;
pub mod register_item_cmd;
pub mod reserve_item_cmd;
pub mod return_loan_cmd;
