use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stock_checker_core::models::{
    portfolio::PortfolioSnapshot, rebalance::RebalancePlan, refresh::RefreshReport,
    refresh::RefreshStatus, settings::Settings,
};

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum RefreshState {
    Completed,
    Skipped,
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    status: RefreshState,
    report: Option<RefreshReport>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RebalanceQuery {
    target_ratio: Option<String>,
}

async fn get_portfolio(State(state): State<Arc<AppState>>) -> ApiResult<Json<PortfolioSnapshot>> {
    Ok(Json(state.checker.snapshot()))
}

async fn refresh(State(state): State<Arc<AppState>>) -> ApiResult<Json<RefreshResponse>> {
    let response = match state.checker.refresh().await {
        RefreshStatus::Completed(report) => RefreshResponse {
            status: RefreshState::Completed,
            report: Some(report),
        },
        RefreshStatus::Skipped => RefreshResponse {
            status: RefreshState::Skipped,
            report: None,
        },
    };
    Ok(Json(response))
}

async fn get_rebalance(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RebalanceQuery>,
) -> ApiResult<Json<RebalancePlan>> {
    let target = match query.target_ratio.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(
            Decimal::from_str(raw)
                .map_err(|_| ApiError::BadRequest(format!("targetRatio '{raw}' is not a number")))?,
        ),
        _ => None,
    };
    Ok(Json(state.checker.rebalance(target)?))
}

async fn get_settings(State(state): State<Arc<AppState>>) -> ApiResult<Json<Settings>> {
    Ok(Json(state.checker.settings()))
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<Settings>,
) -> ApiResult<Json<Settings>> {
    state
        .blocking(move |checker| checker.update_settings(settings))
        .await?;
    Ok(Json(state.checker.settings()))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/portfolio", get(get_portfolio))
        .route("/refresh", post(refresh))
        .route("/rebalance", get(get_rebalance))
        .route("/settings", get(get_settings).put(update_settings))
}
