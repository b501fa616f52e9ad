use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{info, warn};
use rust_decimal::Decimal;
use tokio::sync::watch;

use crate::models::holding::Holding;
use crate::models::portfolio::PortfolioSnapshot;
use crate::models::refresh::{HoldingOutcome, ReconcileSummary, RefreshReport, RefreshStatus};
use crate::storage::HoldingRepository;

use super::fx_service::FxRateProvider;
use super::quote_service::QuoteResolver;
use super::valuation_service::ValuationService;

/// Re-prices every holding, one at a time, and publishes the new snapshot.
///
/// Single-flight: a request arriving while a refresh runs is dropped and
/// answered with [`RefreshStatus::Skipped`]. There is no mid-pass cancel.
///
/// The pass works on a copy of the stored list. User edits committed while
/// it runs are not blocked; they are merged back afterwards by
/// [`reconcile`], keyed by code. The merge, the save and the publish happen
/// under the repository's list lock, so no edit can land in between.
pub struct RefreshOrchestrator {
    resolver: Arc<QuoteResolver>,
    fx: Arc<FxRateProvider>,
    repository: HoldingRepository,
    valuation: ValuationService,
    pacing_ms: AtomicU64,
    running: AtomicBool,
    publisher: watch::Sender<PortfolioSnapshot>,
}

impl RefreshOrchestrator {
    pub fn new(
        resolver: Arc<QuoteResolver>,
        fx: Arc<FxRateProvider>,
        repository: HoldingRepository,
        pacing: Duration,
    ) -> Self {
        let holdings = repository.load_holdings().unwrap_or_else(|e| {
            warn!("Could not load holdings for the initial snapshot: {e}");
            Vec::new()
        });
        let (publisher, _) = watch::channel(PortfolioSnapshot::from_holdings(holdings, fx.rate()));
        Self {
            resolver,
            fx,
            repository,
            valuation: ValuationService::new(),
            pacing_ms: AtomicU64::new(duration_ms(pacing)),
            running: AtomicBool::new(false),
            publisher,
        }
    }

    /// Delay between two holdings, applied from the next holding on.
    pub fn set_pacing(&self, pacing: Duration) {
        self.pacing_ms.store(duration_ms(pacing), Ordering::Relaxed);
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms.load(Ordering::Relaxed))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// The most recently published snapshot.
    pub fn latest(&self) -> PortfolioSnapshot {
        self.publisher.borrow().clone()
    }

    /// Receive every snapshot published from now on.
    pub fn subscribe(&self) -> watch::Receiver<PortfolioSnapshot> {
        self.publisher.subscribe()
    }

    /// Publish a snapshot of the stored list as it is, without fetching.
    /// Used after user edits.
    pub fn publish_stored(&self) -> PortfolioSnapshot {
        match self.repository.load_holdings() {
            Ok(holdings) => self.publish(holdings),
            Err(e) => {
                warn!("Could not load holdings to publish: {e}");
                self.latest()
            }
        }
    }

    /// Run one refresh pass, unless one is already running.
    pub async fn refresh(&self) -> RefreshStatus {
        let Some(_flight) = FlightGuard::acquire(&self.running) else {
            info!("Refresh already running; request dropped");
            return RefreshStatus::Skipped;
        };

        let started_at = Utc::now();
        let mut working = match self.repository.load_holdings() {
            Ok(holdings) => holdings,
            Err(e) => {
                warn!("Could not load holdings, refreshing the last snapshot in memory only: {e}");
                self.latest().holdings
            }
        };
        info!("Refresh started for {} holdings", working.len());

        // One rate for the whole pass.
        let fx_rate = self.fx.refresh_and_store(&self.repository).await;

        let mut outcomes = Vec::with_capacity(working.len());
        let count = working.len();
        for (idx, holding) in working.iter_mut().enumerate() {
            outcomes.push(self.refresh_holding(holding, fx_rate.rate).await);
            let pacing = self.pacing();
            if idx + 1 < count && !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }
        }

        let reconciliation = self.commit(working, fx_rate.rate);

        let report = RefreshReport {
            started_at,
            finished_at: Utc::now(),
            fx_rate,
            outcomes,
            reconciliation,
        };
        info!(
            "Refresh finished: {} resolved, {} failed",
            report.resolved_count(),
            report.failed_count()
        );
        RefreshStatus::Completed(report)
    }

    async fn refresh_holding(&self, holding: &mut Holding, fx_rate: Decimal) -> HoldingOutcome {
        if let Err(e) = holding.validate() {
            warn!("Skipping invalid holding {}: {e}", holding.id);
            return HoldingOutcome::Failed {
                id: holding.id.clone(),
                code: holding.code.clone(),
                error: e.to_string(),
            };
        }

        let quote = self
            .resolver
            .resolve(&holding.code, holding.market, holding.instrument_type)
            .await;
        self.valuation.apply_quote(holding, &quote, fx_rate, Utc::now());

        HoldingOutcome::Resolved {
            id: holding.id.clone(),
            code: holding.code.clone(),
            value: holding.last_value.unwrap_or_default(),
            quote,
        }
    }

    /// Merge the refreshed list with the stored one, save and publish it.
    ///
    /// Runs under the list lock. When the stored list cannot be read nothing
    /// is saved; the refreshed list is only published.
    fn commit(&self, working: Vec<Holding>, fx_rate: Decimal) -> ReconcileSummary {
        let _lock = match self.repository.lock_list() {
            Ok(lock) => lock,
            Err(e) => {
                warn!("Refreshed holdings not saved: {e}");
                self.publish(working);
                return ReconcileSummary::default();
            }
        };
        let persisted = match self.repository.load_holdings() {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!("Refreshed holdings not saved, stored list left untouched: {e}");
                self.publish(working);
                return ReconcileSummary::default();
            }
        };
        let tombstones = self.repository.load_tombstones().unwrap_or_else(|e| {
            warn!("Ignoring unreadable removal records: {e}");
            Vec::new()
        });

        let (holdings, summary) = reconcile(working, &persisted, &tombstones, &self.valuation, fx_rate);
        if !summary.is_empty() {
            info!(
                "Reconciled refresh: {} re-appended, {} adopted edits, {} dropped",
                summary.reappended.len(),
                summary.adopted.len(),
                summary.dropped.len()
            );
        }
        if let Err(e) = self.repository.save_holdings(&holdings) {
            warn!("Failed to persist refreshed holdings: {e}");
        }
        self.publish(holdings);
        summary
    }

    fn publish(&self, holdings: Vec<Holding>) -> PortfolioSnapshot {
        let snapshot = PortfolioSnapshot::from_holdings(holdings, self.fx.rate());
        self.publisher.send_replace(snapshot.clone());
        snapshot
    }
}

/// Merge a refreshed working list with the list persisted meanwhile.
///
/// Codes are compared case-insensitively. The working list is the base:
/// - entries whose id was removed meanwhile are dropped
/// - for codes in both lists, shares, market and pin come from the persisted
///   entry and the value is recomputed from the refreshed price; when the
///   adopted market changes the quote currency, the refreshed quote is
///   dropped instead
/// - persisted entries whose code is missing from the working list are appended
pub fn reconcile(
    working: Vec<Holding>,
    persisted: &[Holding],
    tombstones: &[String],
    valuation: &ValuationService,
    fx_rate: Decimal,
) -> (Vec<Holding>, ReconcileSummary) {
    let removed: HashSet<&str> = tombstones.iter().map(String::as_str).collect();
    let by_code: HashMap<String, &Holding> = persisted
        .iter()
        .map(|h| (h.code.to_lowercase(), h))
        .collect();

    let mut summary = ReconcileSummary::default();
    let mut merged = Vec::with_capacity(working.len().max(persisted.len()));
    let mut seen: HashSet<String> = HashSet::new();

    for mut holding in working {
        if removed.contains(holding.id.as_str()) {
            summary.dropped.push(holding.code.clone());
            continue;
        }
        let key = holding.code.to_lowercase();
        if let Some(stored) = by_code.get(&key) {
            let edited = stored.shares != holding.shares
                || stored.market != holding.market
                || stored.user_pinned_market != holding.user_pinned_market;
            if edited {
                let repriced = holding.pricing_basis() != stored.pricing_basis();
                holding.shares = stored.shares;
                holding.market = stored.market;
                holding.user_pinned_market = stored.user_pinned_market;
                holding.currency = stored.currency.clone();
                if repriced {
                    holding.clear_quote();
                } else {
                    valuation.revalue(&mut holding, fx_rate);
                }
                summary.adopted.push(holding.code.clone());
            }
        }
        seen.insert(key);
        merged.push(holding);
    }

    for stored in persisted {
        let key = stored.code.to_lowercase();
        if seen.contains(&key) || removed.contains(stored.id.as_str()) {
            continue;
        }
        seen.insert(key);
        summary.reappended.push(stored.code.clone());
        merged.push(stored.clone());
    }

    (merged, summary)
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Holds the in-flight flag; clears it when dropped, even on panic.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
