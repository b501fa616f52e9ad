use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stock_checker_core::models::holding::{InstrumentType, Market};

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteQuery {
    code: Option<String>,
    market: Option<String>,
    instrument_type: Option<String>,
    /// Older clients send `isUSStock=true` instead of a market.
    #[serde(rename = "isUSStock")]
    is_us_stock: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    code: String,
    price: Decimal,
    change: Option<String>,
    currency: String,
    source_url: String,
    source_id: String,
    name: Option<String>,
    synthetic: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FxResponse {
    /// `false` while the rate is still the configured default.
    success: bool,
    rate: Decimal,
    fetched_at: Option<DateTime<Utc>>,
}

async fn get_quote(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuoteQuery>,
) -> ApiResult<Json<QuoteResponse>> {
    let code = query
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::QuoteRequest("code is required".into()))?;

    let market = match (query.market.as_deref(), query.is_us_stock) {
        (Some(market), _) => Market::from_str(market).map_err(|e| ApiError::QuoteRequest(e.to_string()))?,
        (None, Some(true)) => Market::Foreign,
        (None, _) => stock_checker_core::models::holding::derive_market(code, None),
    };
    let instrument = match query.instrument_type.as_deref() {
        Some(kind) => InstrumentType::from_str(kind).map_err(|e| ApiError::QuoteRequest(e.to_string()))?,
        None => InstrumentType::Equity,
    };

    let quote = state.checker.resolve_quote(code, market, instrument).await;
    Ok(Json(QuoteResponse {
        code: quote.code,
        price: quote.price,
        change: quote.change_text,
        currency: quote.currency,
        source_url: quote.source_url,
        source_id: quote.source_id,
        name: quote.display_name,
        synthetic: quote.synthetic,
    }))
}

async fn get_fx(State(state): State<Arc<AppState>>) -> ApiResult<Json<FxResponse>> {
    let mut rate = state.checker.fx_rate();
    if !rate.is_fetched() {
        rate = state.checker.refresh_fx_rate().await;
    }
    Ok(Json(FxResponse {
        success: rate.is_fetched(),
        rate: rate.rate,
        fetched_at: rate.fetched_at,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quote", get(get_quote))
        .route("/fx", get(get_fx))
}
