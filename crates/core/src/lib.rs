pub mod errors;
pub mod extraction;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;
pub mod transfer;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use log::{info, warn};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::watch;

use errors::CoreError;
use models::{
    holding::{Holding, InstrumentType, Market, NewHolding},
    portfolio::PortfolioSnapshot,
    quote::{FxRate, ResolvedQuote},
    rebalance::RebalancePlan,
    refresh::RefreshStatus,
    settings::Settings,
};
use providers::fx::{PageFxSource, YahooChartFxSource, USD_JPY_SYMBOL};
use providers::registry::QuoteSourceRegistry;
use providers::traits::FxSource;
use services::{
    fx_service::FxRateProvider,
    portfolio_service::{AddOutcome, ImportSummary, PortfolioService},
    quote_service::QuoteResolver,
    rebalance_service::RebalanceService,
    refresh_service::RefreshOrchestrator,
    valuation_service::ValuationService,
};
use storage::{HoldingRepository, KeyValueStore};
use transfer::ChunkAssembler;

/// Main entry point for the Stock Checker core library.
///
/// Owns the store, the quote and FX machinery and the refresh orchestrator.
/// Every method takes `&self`, so one instance can be shared behind an `Arc`
/// between request handlers and the refresh timer.
pub struct StockChecker {
    repository: HoldingRepository,
    settings: RwLock<Settings>,
    resolver: Arc<QuoteResolver>,
    fx: Arc<FxRateProvider>,
    orchestrator: RefreshOrchestrator,
    portfolio_service: PortfolioService,
    valuation_service: ValuationService,
    rebalance_service: RebalanceService,
}

impl std::fmt::Debug for StockChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockChecker")
            .field("settings", &self.settings())
            .field("fx_rate", &self.fx.rate())
            .field("refreshing", &self.orchestrator.is_running())
            .finish()
    }
}

impl StockChecker {
    /// Open a checker on a store with every shipped quote and FX source.
    pub fn open(store: Arc<dyn KeyValueStore>) -> Result<Self, CoreError> {
        let repository = HoldingRepository::new(store);
        let settings = repository.load_settings()?;
        let timeout = Duration::from_secs(settings.request_timeout_secs);

        let registry = QuoteSourceRegistry::new_with_defaults(timeout);

        let mut fx_sources: Vec<Box<dyn FxSource>> = Vec::new();
        match YahooChartFxSource::new(USD_JPY_SYMBOL) {
            Ok(source) => fx_sources.push(Box::new(source)),
            Err(e) => warn!("Yahoo chart FX source unavailable: {e}"),
        }
        match PageFxSource::yahoo_japan(timeout) {
            Ok(source) => fx_sources.push(Box::new(source)),
            Err(e) => warn!("Yahoo Japan FX page source unavailable: {e}"),
        }

        Self::build(repository, settings, registry, fx_sources)
    }

    /// Open a checker with caller-supplied sources (alternative sources, tests).
    pub fn with_sources(
        store: Arc<dyn KeyValueStore>,
        registry: QuoteSourceRegistry,
        fx_sources: Vec<Box<dyn FxSource>>,
    ) -> Result<Self, CoreError> {
        let repository = HoldingRepository::new(store);
        let settings = repository.load_settings()?;
        Self::build(repository, settings, registry, fx_sources)
    }

    // ── Quotes & FX ─────────────────────────────────────────────────

    /// Resolve a quote for any code, tracked or not. Never fails; see
    /// [`QuoteResolver::resolve`].
    pub async fn resolve_quote(&self, code: &str, market: Market, instrument: InstrumentType) -> ResolvedQuote {
        self.resolver.resolve(code, market, instrument).await
    }

    pub fn fx_rate(&self) -> FxRate {
        self.fx.current()
    }

    /// Fetch a fresh FX rate now (outside of a refresh) and persist it.
    pub async fn refresh_fx_rate(&self) -> FxRate {
        self.fx.refresh_and_store(&self.repository).await
    }

    // ── Holdings ────────────────────────────────────────────────────

    /// The stored holdings list.
    pub fn holdings(&self) -> Result<Vec<Holding>, CoreError> {
        self.repository.load_holdings()
    }

    pub fn holding(&self, id: &str) -> Result<Holding, CoreError> {
        self.holdings()?
            .into_iter()
            .find(|h| h.id == id)
            .ok_or_else(|| CoreError::HoldingNotFound(id.to_string()))
    }

    /// Add a holding, or update the shares of the holding with the same code.
    pub fn add_holding(&self, new: &NewHolding) -> Result<AddOutcome, CoreError> {
        let settings = self.settings();
        self.edit(|holdings| {
            let outcome = self.portfolio_service.add_holding(holdings, new, &settings)?;
            if let AddOutcome::SharesUpdated(id) = &outcome {
                self.revalue_in(holdings, id);
            }
            Ok(outcome)
        })
    }

    /// Add a holding and value it right away from a freshly resolved quote.
    pub async fn add_holding_valued(&self, new: &NewHolding) -> Result<Holding, CoreError> {
        let outcome = self.add_holding(new)?;
        self.value_holding(outcome.id()).await
    }

    /// Resolve one holding's quote and store the resulting value.
    pub async fn value_holding(&self, id: &str) -> Result<Holding, CoreError> {
        let holding = self.holding(id)?;
        holding.validate()?;
        let quote = self
            .resolver
            .resolve(&holding.code, holding.market, holding.instrument_type)
            .await;
        let fx_rate = self.fx.rate();

        self.edit(|holdings| {
            let target = holdings
                .iter_mut()
                .find(|h| h.id == id)
                .ok_or_else(|| CoreError::HoldingNotFound(id.to_string()))?;
            self.valuation_service
                .apply_quote(target, &quote, fx_rate, Utc::now());
            Ok(target.clone())
        })
    }

    /// Replace the shares/units of a holding and re-value it at its last price.
    pub fn update_shares(&self, id: &str, shares: Decimal) -> Result<Holding, CoreError> {
        self.edit(|holdings| {
            self.portfolio_service.update_shares(holdings, id, shares)?;
            Ok(self.revalue_in(holdings, id))
        })?
        .ok_or_else(|| CoreError::HoldingNotFound(id.to_string()))
    }

    /// Pin a holding to a market chosen by the user. A pin that changes the
    /// quote currency drops the last quote until the next refresh.
    pub fn pin_market(&self, id: &str, market: Market) -> Result<Holding, CoreError> {
        let settings = self.settings();
        self.edit(|holdings| {
            self.portfolio_service
                .pin_market(holdings, id, market, &settings)?;
            Ok(self.revalue_in(holdings, id))
        })?
        .ok_or_else(|| CoreError::HoldingNotFound(id.to_string()))
    }

    /// Remove a holding. A refresh running meanwhile will not bring it back:
    /// the tombstone is written before the shortened list.
    pub fn remove_holding(&self, id: &str) -> Result<Holding, CoreError> {
        self.edit(|holdings| {
            let removed = self.portfolio_service.remove_holding(holdings, id)?;
            self.repository.add_tombstone(&removed.id)?;
            Ok(removed)
        })
    }

    // ── Import / Export ─────────────────────────────────────────────

    pub fn import_json(&self, json: &str) -> Result<ImportSummary, CoreError> {
        let records: Vec<Value> = serde_json::from_str(json)?;
        self.import_records(&records)
    }

    pub fn import_records(&self, records: &[Value]) -> Result<ImportSummary, CoreError> {
        let settings = self.settings();
        let summary = self.edit(|holdings| {
            Ok(self
                .portfolio_service
                .import_records(holdings, records, &settings))
        })?;
        info!(
            "Imported holdings: {} added, {} skipped, {} invalid",
            summary.added, summary.skipped, summary.invalid
        );
        Ok(summary)
    }

    /// Import a payload rebuilt from transfer chunks.
    pub fn import_transfer(&self, assembler: &ChunkAssembler) -> Result<ImportSummary, CoreError> {
        let json = assembler.finish()?;
        self.import_json(&json)
    }

    pub fn export_json(&self) -> Result<String, CoreError> {
        self.portfolio_service.export_json(&self.holdings()?)
    }

    /// The exported JSON as encoded transfer chunks.
    pub fn export_chunks(&self) -> Result<Vec<String>, CoreError> {
        transfer::encode_chunks(&self.export_json()?)
    }

    // ── Refresh & Snapshot ──────────────────────────────────────────

    /// Re-price every holding. Dropped when a refresh is already running.
    pub async fn refresh(&self) -> RefreshStatus {
        self.orchestrator.refresh().await
    }

    pub fn is_refreshing(&self) -> bool {
        self.orchestrator.is_running()
    }

    pub fn snapshot(&self) -> PortfolioSnapshot {
        self.orchestrator.latest()
    }

    pub fn subscribe(&self) -> watch::Receiver<PortfolioSnapshot> {
        self.orchestrator.subscribe()
    }

    // ── Rebalance ───────────────────────────────────────────────────

    /// Rebalance plan for the latest snapshot. `target_domestic_ratio`
    /// defaults to the stored setting.
    pub fn rebalance(&self, target_domestic_ratio: Option<Decimal>) -> Result<RebalancePlan, CoreError> {
        let settings = self.settings();
        let target = target_domestic_ratio.unwrap_or(settings.target_domestic_ratio);
        self.rebalance_service
            .plan(&self.snapshot().totals, target, settings.rebalance_threshold)
    }

    // ── Settings ────────────────────────────────────────────────────

    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Validate and persist settings. Pacing applies from the next refreshed
    /// holding on. Currencies and the request timeout are baked into the
    /// sources and apply the next time the checker is opened.
    pub fn update_settings(&self, settings: Settings) -> Result<(), CoreError> {
        if settings.default_fx_rate <= Decimal::ZERO {
            return Err(CoreError::validation("defaultFxRate", "must be greater than zero"));
        }
        if settings.target_domestic_ratio < Decimal::ZERO
            || settings.target_domestic_ratio > Decimal::ONE_HUNDRED
        {
            return Err(CoreError::validation("targetDomesticRatio", "must be between 0 and 100"));
        }
        if settings.refresh_interval_minutes == 0 {
            return Err(CoreError::validation("refreshIntervalMinutes", "must be at least 1"));
        }
        self.repository.save_settings(&settings)?;
        self.orchestrator
            .set_pacing(Duration::from_millis(settings.pacing_ms));
        if let Ok(mut current) = self.settings.write() {
            *current = settings;
        }
        Ok(())
    }

    // ── Internal ────────────────────────────────────────────────────

    fn build(
        repository: HoldingRepository,
        settings: Settings,
        registry: QuoteSourceRegistry,
        fx_sources: Vec<Box<dyn FxSource>>,
    ) -> Result<Self, CoreError> {
        let resolver = Arc::new(
            QuoteResolver::new(registry)
                .with_currencies(&settings.reporting_currency, &settings.foreign_currency),
        );

        let fx = fx_sources
            .into_iter()
            .fold(FxRateProvider::new(settings.default_fx_rate), |fx, source| {
                fx.with_source(source)
            });
        if let Some(rate) = repository.load_fx_rate()? {
            fx.restore(rate);
        }
        let fx = Arc::new(fx);

        let orchestrator = RefreshOrchestrator::new(
            Arc::clone(&resolver),
            Arc::clone(&fx),
            repository.clone(),
            Duration::from_millis(settings.pacing_ms),
        );

        Ok(Self {
            repository,
            settings: RwLock::new(settings),
            resolver,
            fx,
            orchestrator,
            portfolio_service: PortfolioService::new(),
            valuation_service: ValuationService::new(),
            rebalance_service: RebalanceService::new(),
        })
    }

    /// Load, mutate and save the holdings list, then publish a snapshot, all
    /// under the list lock shared with the refresh. Nothing is saved when `f`
    /// fails or the stored list cannot be read.
    fn edit<T, F>(&self, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut Vec<Holding>) -> Result<T, CoreError>,
    {
        let _lock = self.repository.lock_list()?;
        let mut holdings = self.repository.load_holdings()?;
        let result = f(&mut holdings)?;
        self.repository.save_holdings(&holdings)?;
        self.orchestrator.publish_stored();
        Ok(result)
    }

    fn revalue_in(&self, holdings: &mut [Holding], id: &str) -> Option<Holding> {
        let fx_rate = self.fx.rate();
        let holding = holdings.iter_mut().find(|h| h.id == id)?;
        self.valuation_service.revalue(holding, fx_rate);
        Some(holding.clone())
    }
}
