use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stock_checker_core::{
    models::holding::{Holding, Market, NewHolding},
    services::portfolio_service::{AddOutcome, ImportSummary},
    transfer::ChunkAssembler,
};

use crate::{error::ApiResult, main_lib::AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddQuery {
    /// Resolve a quote and value the holding before answering.
    #[serde(default)]
    value_now: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddResponse {
    outcome: AddOutcome,
    holding: Holding,
}

#[derive(Debug, Deserialize)]
struct SharesUpdate {
    shares: Decimal,
}

#[derive(Debug, Deserialize)]
struct MarketUpdate {
    market: Market,
}

async fn list_holdings(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Holding>>> {
    Ok(Json(state.blocking(|checker| checker.holdings()).await?))
}

async fn add_holding(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AddQuery>,
    Json(new): Json<NewHolding>,
) -> ApiResult<(StatusCode, Json<AddResponse>)> {
    let outcome = state.blocking(move |checker| checker.add_holding(&new)).await?;
    let holding = if query.value_now {
        state.checker.value_holding(outcome.id()).await?
    } else {
        let id = outcome.id().to_string();
        state.blocking(move |checker| checker.holding(&id)).await?
    };
    let status = match outcome {
        AddOutcome::Created(_) => StatusCode::CREATED,
        AddOutcome::SharesUpdated(_) => StatusCode::OK,
    };
    Ok((status, Json(AddResponse { outcome, holding })))
}

async fn update_shares(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(update): Json<SharesUpdate>,
) -> ApiResult<Json<Holding>> {
    let holding = state
        .blocking(move |checker| checker.update_shares(&id, update.shares))
        .await?;
    Ok(Json(holding))
}

async fn pin_market(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(update): Json<MarketUpdate>,
) -> ApiResult<Json<Holding>> {
    let holding = state
        .blocking(move |checker| checker.pin_market(&id, update.market))
        .await?;
    Ok(Json(holding))
}

async fn remove_holding(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Holding>> {
    Ok(Json(state.blocking(move |checker| checker.remove_holding(&id)).await?))
}

async fn import_holdings(
    State(state): State<Arc<AppState>>,
    Json(records): Json<Vec<Value>>,
) -> ApiResult<Json<ImportSummary>> {
    let summary = state
        .blocking(move |checker| checker.import_records(&records))
        .await?;
    Ok(Json(summary))
}

async fn export_holdings(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let json = state.blocking(|checker| checker.export_json()).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], json))
}

async fn export_chunks(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.blocking(|checker| checker.export_chunks()).await?))
}

async fn import_chunks(
    State(state): State<Arc<AppState>>,
    Json(chunks): Json<Vec<String>>,
) -> ApiResult<Json<ImportSummary>> {
    let mut assembler = ChunkAssembler::new();
    for chunk in &chunks {
        assembler.push_encoded(chunk)?;
    }
    let summary = state
        .blocking(move |checker| checker.import_transfer(&assembler))
        .await?;
    Ok(Json(summary))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/holdings", get(list_holdings).post(add_holding))
        .route("/holdings/import", post(import_holdings))
        .route("/holdings/export", get(export_holdings))
        .route("/holdings/transfer", get(export_chunks).post(import_chunks))
        .route("/holdings/{id}", delete(remove_holding))
        .route("/holdings/{id}/shares", put(update_shares))
        .route("/holdings/{id}/market", put(pin_market))
}
