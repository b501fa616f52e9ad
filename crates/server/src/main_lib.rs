use std::sync::Arc;

use stock_checker_core::errors::CoreError;
use stock_checker_core::storage::{JsonFileStore, KeyValueStore};
use stock_checker_core::StockChecker;
use tokio::task;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LogFormat};
use crate::error::{ApiError, ApiResult};

pub struct AppState {
    pub checker: Arc<StockChecker>,
}

impl AppState {
    pub fn new(checker: Arc<StockChecker>) -> Arc<Self> {
        Arc::new(Self { checker })
    }

    /// Run a checker call that reads or writes the store on the blocking
    /// pool, off the runtime threads.
    pub async fn blocking<T, F>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&StockChecker) -> Result<T, CoreError> + Send + 'static,
        T: Send + 'static,
    {
        let checker = Arc::clone(&self.checker);
        let value = task::spawn_blocking(move || f(&checker))
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to execute store task: {e}")))??;
        Ok(value)
    }
}

/// Install the global subscriber. Records emitted through `log` by the core
/// crate are bridged into it.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_current_span(false)).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&config.data_file));
    tracing::info!("Data file in use: {}", config.data_file.display());
    let checker = StockChecker::open(store)?;
    Ok(AppState::new(Arc::new(checker)))
}
