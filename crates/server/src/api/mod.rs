mod holdings;
mod portfolio;
mod quotes;

use std::sync::Arc;

use axum::Router;

use crate::main_lib::AppState;

pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(quotes::router())
        .merge(holdings::router())
        .merge(portfolio::router())
        .with_state(state)
}
