pub mod claim_stock_cmd;
pub mod release_stock_cmd;
pub mod stock_item_cmd;
