//! Background auto-refresh.
//!
//! Wakes up every `refresh_interval_minutes` (re-read from the settings on
//! each round) and triggers a refresh when `auto_refresh` is on. A tick that
//! lands while a refresh is still running is dropped by the core.

use std::sync::Arc;
use std::time::Duration;

use stock_checker_core::models::refresh::RefreshStatus;
use tracing::{debug, info};

use crate::main_lib::AppState;

/// Starts the background refresh loop.
pub fn start_refresh_scheduler(state: Arc<AppState>) {
    tokio::spawn(async move {
        info!("Refresh scheduler started");
        loop {
            let settings = state.checker.settings();
            let minutes = settings.refresh_interval_minutes.max(1);
            tokio::time::sleep(Duration::from_secs(minutes * 60)).await;
            run_scheduled_refresh(&state).await;
        }
    });
}

async fn run_scheduled_refresh(state: &Arc<AppState>) {
    if !state.checker.settings().auto_refresh {
        debug!("Scheduled refresh skipped: auto-refresh is off");
        return;
    }
    match state.checker.refresh().await {
        RefreshStatus::Completed(report) => info!(
            resolved = report.resolved_count(),
            failed = report.failed_count(),
            "Scheduled refresh completed"
        ),
        RefreshStatus::Skipped => info!("Scheduled refresh skipped: a refresh is already running"),
    }
}
