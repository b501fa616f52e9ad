use std::sync::RwLock;

use chrono::Utc;
use log::{debug, info, warn};
use rust_decimal::Decimal;

use crate::models::quote::FxRate;
use crate::providers::traits::FxSource;
use crate::storage::HoldingRepository;

/// Owns the process-wide foreign → reporting currency rate.
///
/// Sources are tried in order on every refresh. When all of them fail the
/// previous rate stays in place; until one succeeds for the first time that
/// is the configured default.
pub struct FxRateProvider {
    sources: Vec<Box<dyn FxSource>>,
    current: RwLock<FxRate>,
}

impl FxRateProvider {
    pub fn new(default_rate: Decimal) -> Self {
        Self {
            sources: Vec::new(),
            current: RwLock::new(FxRate::fallback(default_rate)),
        }
    }

    pub fn with_source(mut self, source: Box<dyn FxSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Start from a previously persisted rate.
    pub fn restore(&self, rate: FxRate) {
        if let Ok(mut current) = self.current.write() {
            *current = rate;
        }
    }

    pub fn current(&self) -> FxRate {
        self.current
            .read()
            .map(|rate| rate.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn rate(&self) -> Decimal {
        self.current().rate
    }

    /// Fetch a fresh rate. Returns the rate in effect afterwards, which is
    /// the previous one when every source failed.
    pub async fn refresh(&self) -> FxRate {
        for source in &self.sources {
            match source.fetch_rate().await {
                Ok(rate) if rate > Decimal::ZERO => {
                    debug!("FX rate {rate} from {}", source.id());
                    let fresh = FxRate {
                        rate,
                        fetched_at: Some(Utc::now()),
                    };
                    if let Ok(mut current) = self.current.write() {
                        *current = fresh.clone();
                    }
                    return fresh;
                }
                Ok(rate) => warn!("Ignoring non-positive FX rate {rate} from {}", source.id()),
                Err(e) => warn!("FX source {} failed: {e}", source.id()),
            }
        }
        let kept = self.current();
        info!("Keeping FX rate {} (no source answered)", kept.rate);
        kept
    }

    /// Refresh and persist the rate in effect afterwards.
    pub async fn refresh_and_store(&self, repository: &HoldingRepository) -> FxRate {
        let rate = self.refresh().await;
        if rate.is_fetched() {
            if let Err(e) = repository.save_fx_rate(&rate) {
                warn!("Failed to persist FX rate: {e}");
            }
        }
        rate
    }
}
