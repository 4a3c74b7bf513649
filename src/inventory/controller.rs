use axum::{
    extract::State,
    response::Json,
};
use serde_json::Value;
use crate::core::command::Command;
use crate::core::controller::{AppState, json_to_server_error, ServerError};
use crate::inventory::command::claim_stock_cmd::{ClaimStockCommand, ClaimStockCommandRequest, ClaimStockCommandResponse};
use crate::inventory::command::release_stock_cmd::{ReleaseStockCommand, ReleaseStockCommandRequest, ReleaseStockCommandResponse};
use crate::inventory::command::stock_item_cmd::{StockItemCommand, StockItemCommandRequest, StockItemCommandResponse};

pub async fn stock_item(
    State(state): State<AppState>,
    json: Json<Value>) -> Result<Json<StockItemCommandResponse>, ServerError> {
    let req: StockItemCommandRequest = serde_json::from_value(json.0).map_err(json_to_server_error)?;
    let res = StockItemCommand::new(state.inventory).execute(req).await?;
    Ok(Json(res))
}

pub async fn claim_stock(
    State(state): State<AppState>,
    json: Json<Value>) -> Result<Json<ClaimStockCommandResponse>, ServerError> {
    let req: ClaimStockCommandRequest = serde_json::from_value(json.0).map_err(json_to_server_error)?;
    let res = ClaimStockCommand::new(state.inventory).execute(req).await?;
    Ok(Json(res))
}

pub async fn release_stock(
    State(state): State<AppState>,
    json: Json<Value>) -> Result<Json<ReleaseStockCommandResponse>, ServerError> {
    let req: ReleaseStockCommandRequest = serde_json::from_value(json.0).map_err(json_to_server_error)?;
    let res = ReleaseStockCommand::new(state.inventory).execute(req).await?;
    Ok(Json(res))
}
