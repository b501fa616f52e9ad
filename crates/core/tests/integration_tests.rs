use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use stock_checker_core::errors::CoreError;
use stock_checker_core::models::holding::{Classification, Holding, InstrumentType, Market, NewHolding};
use stock_checker_core::models::quote::{FxRate, QuoteResult};
use stock_checker_core::models::refresh::{HoldingOutcome, RefreshStatus};
use stock_checker_core::models::settings::Settings;
use stock_checker_core::providers::registry::QuoteSourceRegistry;
use stock_checker_core::providers::traits::{FxSource, QuoteSource};
use stock_checker_core::services::portfolio_service::{AddOutcome, ImportSummary};
use stock_checker_core::services::quote_service::synthetic_price;
use stock_checker_core::storage::manager::{HOLDINGS_KEY, REMOVED_KEY};
use stock_checker_core::storage::{HoldingRepository, KeyValueStore, MemoryStore};
use stock_checker_core::transfer::ChunkAssembler;
use stock_checker_core::StockChecker;

// ═══════════════════════════════════════════════════════════════════
// Mock Sources (for testing without real network calls)
// ═══════════════════════════════════════════════════════════════════

/// Quotes codes from a fixed table; unknown codes come back unpriced.
struct TableSource {
    prices: HashMap<String, Decimal>,
    calls: Arc<AtomicUsize>,
}

impl TableSource {
    fn new(prices: &[(&str, Decimal)]) -> Self {
        Self {
            prices: prices.iter().map(|(c, p)| (c.to_string(), *p)).collect(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl QuoteSource for TableSource {
    fn id(&self) -> &str {
        "table"
    }

    fn supports(&self, _class: Classification) -> bool {
        true
    }

    async fn fetch(&self, code: &str, _market: Market, _instrument: InstrumentType) -> QuoteResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        QuoteResult {
            price: self.prices.get(code).copied(),
            change_text: None,
            display_name: Some(format!("{code} Corp")),
            source_id: "table".into(),
            fetched_url: format!("table://{code}"),
        }
    }
}

/// Blocks inside `fetch` until released, so a test can act mid-refresh.
struct GatedSource {
    price: Decimal,
    gate: Arc<Gate>,
}

#[derive(Default)]
struct Gate {
    started: Notify,
    release: Notify,
}

#[async_trait]
impl QuoteSource for GatedSource {
    fn id(&self) -> &str {
        "gated"
    }

    fn supports(&self, _class: Classification) -> bool {
        true
    }

    async fn fetch(&self, code: &str, _market: Market, _instrument: InstrumentType) -> QuoteResult {
        self.gate.started.notify_one();
        self.gate.release.notified().await;
        QuoteResult {
            price: Some(self.price),
            change_text: None,
            display_name: Some(format!("{code} Corp")),
            source_id: "gated".into(),
            fetched_url: format!("gated://{code}"),
        }
    }
}

struct CountingFx {
    rate: Decimal,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl FxSource for CountingFx {
    fn id(&self) -> &str {
        "counting"
    }

    async fn fetch_rate(&self) -> Result<Decimal, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rate)
    }
}

// ═══════════════════════════════════════════════════════════════════
// Store Wrappers
// ═══════════════════════════════════════════════════════════════════

/// Delegates to a `MemoryStore`. The first read of the removal list, which
/// a refresh makes while merging, starts an import on another thread.
#[derive(Default)]
struct ImportOnMergeStore {
    inner: MemoryStore,
    checker: OnceLock<Arc<StockChecker>>,
    importer: Mutex<Option<std::thread::JoinHandle<ImportSummary>>>,
}

impl ImportOnMergeStore {
    fn join_importer(&self) -> ImportSummary {
        let handle = self.importer.lock().unwrap().take().expect("import started");
        handle.join().unwrap()
    }
}

impl KeyValueStore for ImportOnMergeStore {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        let value = self.inner.get(key)?;
        if key == REMOVED_KEY {
            if let Some(checker) = self.checker.get() {
                let mut importer = self.importer.lock().unwrap();
                if importer.is_none() {
                    let checker = Arc::clone(checker);
                    *importer = Some(std::thread::spawn(move || {
                        checker
                            .import_json(r#"[{"code":"AAPL","shares":5,"type":"stock","country":"US"}]"#)
                            .unwrap()
                    }));
                }
            }
        }
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.inner.remove(key)
    }
}

/// Delegates to a `MemoryStore` and records the keys written, in order.
#[derive(Default)]
struct WriteLogStore {
    inner: MemoryStore,
    writes: Mutex<Vec<String>>,
}

impl WriteLogStore {
    fn take_writes(&self) -> Vec<String> {
        std::mem::take(&mut *self.writes.lock().unwrap())
    }
}

impl KeyValueStore for WriteLogStore {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.writes.lock().unwrap().push(key.to_string());
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.inner.remove(key)
    }
}

// ═══════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════

fn store_with_pacing(pacing_ms: u64) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    HoldingRepository::new(store.clone())
        .save_settings(&Settings {
            pacing_ms,
            ..Settings::default()
        })
        .unwrap();
    store
}

fn checker_with(sources: Vec<Box<dyn QuoteSource>>, fx: Vec<Box<dyn FxSource>>) -> StockChecker {
    let mut registry = QuoteSourceRegistry::new();
    for source in sources {
        registry.register(source);
    }
    StockChecker::with_sources(store_with_pacing(0), registry, fx).unwrap()
}

fn offline_checker() -> StockChecker {
    checker_with(Vec::new(), Vec::new())
}

fn gated_checker(price: Decimal) -> (Arc<StockChecker>, Arc<Gate>) {
    let gate = Arc::new(Gate::default());
    let source = GatedSource {
        price,
        gate: Arc::clone(&gate),
    };
    (Arc::new(checker_with(vec![Box::new(source)], Vec::new())), gate)
}

fn new(code: &str, shares: Decimal, kind: InstrumentType) -> NewHolding {
    NewHolding {
        code: code.into(),
        shares,
        instrument_type: kind,
        market: None,
    }
}

/// Start a refresh in the background and wait until it is inside `fetch`.
async fn refresh_until_fetching(checker: &Arc<StockChecker>, gate: &Gate) -> JoinHandle<RefreshStatus> {
    let background = Arc::clone(checker);
    let handle = tokio::spawn(async move { background.refresh().await });
    gate.started.notified().await;
    handle
}

fn without_timestamps(mut holdings: Vec<Holding>) -> Vec<Holding> {
    for h in &mut holdings {
        h.last_updated_at = None;
    }
    holdings
}

// ═══════════════════════════════════════════════════════════════════
// Refresh pass
// ═══════════════════════════════════════════════════════════════════

mod refresh {
    use super::*;

    #[tokio::test]
    async fn offline_refresh_uses_synthetic_quotes() {
        let checker = offline_checker();
        checker.add_holding(&new("7203", dec!(100), InstrumentType::Equity)).unwrap();
        checker.add_holding(&new("AAPL", dec!(10), InstrumentType::Equity)).unwrap();

        let status = checker.refresh().await;
        let report = status.report().expect("refresh should complete");
        assert_eq!(report.resolved_count(), 2);
        assert_eq!(report.failed_count(), 0);
        assert!(!report.fx_rate.is_fetched());

        let snapshot = checker.snapshot();
        assert_eq!(snapshot.synthetic_count, 2);
        let aapl_value = synthetic_price("AAPL") * dec!(10) * dec!(150);
        assert_eq!(snapshot.totals.domestic_total, dec!(1720300));
        assert_eq!(snapshot.totals.foreign_total, aapl_value);
        assert!(snapshot.holdings.iter().all(|h| h.last_source_id.as_deref() == Some("synthetic")));
    }

    #[tokio::test]
    async fn values_from_first_source() {
        let source = TableSource::new(&[("7203", dec!(3000)), ("0331418A", dec!(12345))]);
        let checker = checker_with(vec![Box::new(source)], Vec::new());
        checker.add_holding(&new("7203", dec!(100), InstrumentType::Equity)).unwrap();
        checker.add_holding(&new("0331418A", dec!(10000), InstrumentType::Fund)).unwrap();

        checker.refresh().await;
        let holdings = checker.holdings().unwrap();
        assert_eq!(holdings[0].last_value, Some(dec!(300000)));
        assert_eq!(holdings[0].display_name.as_deref(), Some("7203 Corp"));
        assert_eq!(holdings[1].last_value, Some(dec!(12345)));
        assert!(!holdings[1].last_synthetic);
        assert_eq!(checker.snapshot().totals.domestic_total, dec!(312345));
    }

    #[tokio::test]
    async fn unpriced_code_does_not_stop_the_batch() {
        let source = TableSource::new(&[("7203", dec!(3000))]);
        let checker = checker_with(vec![Box::new(source)], Vec::new());
        checker.add_holding(&new("9999", dec!(1), InstrumentType::Equity)).unwrap();
        checker.add_holding(&new("7203", dec!(100), InstrumentType::Equity)).unwrap();

        let status = checker.refresh().await;
        let report = status.report().unwrap();
        assert_eq!(report.outcomes.len(), 2);
        match &report.outcomes[0] {
            HoldingOutcome::Resolved { quote, value, .. } => {
                assert!(quote.synthetic);
                assert_eq!(*value, dec!(19999));
            }
            other => panic!("Expected a synthetic resolution, got {other:?}"),
        }
        match &report.outcomes[1] {
            HoldingOutcome::Resolved { quote, value, .. } => {
                assert!(!quote.synthetic);
                assert_eq!(*value, dec!(300000));
            }
            other => panic!("Expected a priced resolution, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn refresh_is_idempotent() {
        let source = TableSource::new(&[("7203", dec!(3000)), ("AAPL", dec!(189.84))]);
        let checker = checker_with(vec![Box::new(source)], Vec::new());
        checker.add_holding(&new("7203", dec!(100), InstrumentType::Equity)).unwrap();
        checker.add_holding(&new("AAPL", dec!(3), InstrumentType::Equity)).unwrap();

        checker.refresh().await;
        let first = checker.snapshot();
        checker.refresh().await;
        let second = checker.snapshot();

        assert_eq!(first.totals, second.totals);
        assert_eq!(without_timestamps(first.holdings), without_timestamps(second.holdings));
    }

    #[tokio::test]
    async fn fx_is_fetched_once_per_pass() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fx = CountingFx {
            rate: dec!(151),
            calls: Arc::clone(&calls),
        };
        let source = TableSource::new(&[("AAPL", dec!(150)), ("MSFT", dec!(400))]);
        let checker = checker_with(vec![Box::new(source)], vec![Box::new(fx)]);
        checker.add_holding(&new("AAPL", dec!(10), InstrumentType::Equity)).unwrap();
        checker.add_holding(&new("MSFT", dec!(1), InstrumentType::Equity)).unwrap();

        let status = checker.refresh().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(status.report().unwrap().fx_rate.rate, dec!(151));

        let holdings = checker.holdings().unwrap();
        assert_eq!(holdings[0].last_value, Some(dec!(226500)));
        assert_eq!(holdings[1].last_value, Some(dec!(60400)));
        assert_eq!(checker.fx_rate().rate, dec!(151));
        assert_eq!(checker.snapshot().fx_rate, dec!(151));
    }

    #[tokio::test]
    async fn holdings_are_paced() {
        let store = store_with_pacing(40);
        let checker =
            StockChecker::with_sources(store, QuoteSourceRegistry::new(), Vec::new()).unwrap();
        for code in ["7203", "6758", "9984"] {
            checker.add_holding(&new(code, dec!(1), InstrumentType::Equity)).unwrap();
        }

        let started = Instant::now();
        checker.refresh().await;
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn updated_pacing_applies_without_reopening() {
        let checker = offline_checker();
        for code in ["7203", "6758", "9984"] {
            checker.add_holding(&new(code, dec!(1), InstrumentType::Equity)).unwrap();
        }
        checker
            .update_settings(Settings {
                pacing_ms: 40,
                ..checker.settings()
            })
            .unwrap();

        let started = Instant::now();
        checker.refresh().await;
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn empty_portfolio_completes() {
        let checker = offline_checker();
        let status = checker.refresh().await;
        assert!(status.report().unwrap().outcomes.is_empty());
        assert!(checker.snapshot().holdings.is_empty());
    }

    #[tokio::test]
    async fn snapshot_is_published() {
        let checker = offline_checker();
        checker.add_holding(&new("7203", dec!(1), InstrumentType::Equity)).unwrap();
        let mut rx = checker.subscribe();
        assert!(!rx.has_changed().unwrap());

        checker.refresh().await;
        assert!(rx.has_changed().unwrap());
        let published = rx.borrow_and_update().clone();
        assert_eq!(published.holdings[0].last_price, Some(dec!(17203)));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Concurrency: single flight & reconciliation
// ═══════════════════════════════════════════════════════════════════

mod concurrency {
    use super::*;

    #[tokio::test]
    async fn second_request_is_skipped_while_running() {
        let (checker, gate) = gated_checker(dec!(3000));
        checker.add_holding(&new("7203", dec!(100), InstrumentType::Equity)).unwrap();

        let first = refresh_until_fetching(&checker, &gate).await;
        assert!(checker.is_refreshing());
        let second = checker.refresh().await;
        assert_eq!(second, RefreshStatus::Skipped);

        gate.release.notify_one();
        let first = first.await.unwrap();
        assert!(!first.is_skipped());
        assert!(!checker.is_refreshing());
    }

    #[tokio::test]
    async fn can_refresh_again_after_completion() {
        let checker = offline_checker();
        checker.add_holding(&new("7203", dec!(1), InstrumentType::Equity)).unwrap();
        assert!(!checker.refresh().await.is_skipped());
        assert!(!checker.refresh().await.is_skipped());
    }

    #[tokio::test]
    async fn holding_added_during_refresh_is_kept() {
        let (checker, gate) = gated_checker(dec!(3000));
        checker.add_holding(&new("7203", dec!(100), InstrumentType::Equity)).unwrap();

        let running = refresh_until_fetching(&checker, &gate).await;
        checker.add_holding(&new("AAPL", dec!(5), InstrumentType::Equity)).unwrap();
        gate.release.notify_one();

        let status = running.await.unwrap();
        let report = status.report().unwrap();
        assert_eq!(report.reconciliation.reappended, vec!["AAPL"]);

        let holdings = checker.holdings().unwrap();
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].code, "7203");
        assert_eq!(holdings[0].last_value, Some(dec!(300000)));
        assert_eq!(holdings[1].code, "AAPL");
        assert_eq!(checker.snapshot().holdings.len(), 2);
    }

    #[tokio::test]
    async fn shares_edited_during_refresh_win() {
        let (checker, gate) = gated_checker(dec!(3000));
        let id = checker
            .add_holding(&new("7203", dec!(100), InstrumentType::Equity))
            .unwrap()
            .id()
            .to_string();

        let running = refresh_until_fetching(&checker, &gate).await;
        checker.update_shares(&id, dec!(200)).unwrap();
        gate.release.notify_one();

        let status = running.await.unwrap();
        assert_eq!(status.report().unwrap().reconciliation.adopted, vec!["7203"]);

        let h = checker.holding(&id).unwrap();
        assert_eq!(h.shares, dec!(200));
        assert_eq!(h.last_price, Some(dec!(3000)));
        assert_eq!(h.last_value, Some(dec!(600000)));
    }

    #[tokio::test]
    async fn market_pinned_during_refresh_wins() {
        let (checker, gate) = gated_checker(dec!(150));
        let id = checker
            .add_holding(&new("SPY", dec!(10), InstrumentType::Equity))
            .unwrap()
            .id()
            .to_string();
        assert_eq!(checker.holding(&id).unwrap().market, Market::Foreign);

        let running = refresh_until_fetching(&checker, &gate).await;
        checker.pin_market(&id, Market::Domestic).unwrap();
        gate.release.notify_one();
        running.await.unwrap();

        let h = checker.holding(&id).unwrap();
        assert_eq!(h.market, Market::Domestic);
        assert!(h.user_pinned_market);
        assert_eq!(h.currency, "JPY");
        // The refreshed price was a USD quote; it is not reused as yen.
        assert_eq!(h.last_price, None);
        assert_eq!(h.last_value, None);
        assert_eq!(checker.snapshot().totals.grand_total, Decimal::ZERO);
    }

    #[tokio::test]
    async fn pin_to_another_currency_drops_stored_quote() {
        let checker = offline_checker();
        let id = checker
            .add_holding(&new("SPY", dec!(10), InstrumentType::Equity))
            .unwrap()
            .id()
            .to_string();
        let priced = checker.value_holding(&id).await.unwrap();
        assert!(priced.last_value.is_some());

        let pinned = checker.pin_market(&id, Market::Domestic).unwrap();
        assert_eq!(pinned.currency, "JPY");
        assert_eq!(pinned.last_price, None);
        assert_eq!(pinned.last_value, None);

        checker.refresh().await;
        let repriced = checker.holding(&id).unwrap();
        let expected = synthetic_price("SPY") * dec!(10);
        assert_eq!(repriced.last_value, Some(expected));
    }

    #[tokio::test]
    async fn holding_removed_during_refresh_stays_removed() {
        let (checker, gate) = gated_checker(dec!(3000));
        let id = checker
            .add_holding(&new("7203", dec!(100), InstrumentType::Equity))
            .unwrap()
            .id()
            .to_string();

        let running = refresh_until_fetching(&checker, &gate).await;
        checker.remove_holding(&id).unwrap();
        gate.release.notify_one();

        let status = running.await.unwrap();
        assert_eq!(status.report().unwrap().reconciliation.dropped, vec!["7203"]);
        assert!(checker.holdings().unwrap().is_empty());
        assert!(checker.snapshot().holdings.is_empty());
    }

    #[tokio::test]
    async fn import_during_merge_waits_and_is_kept() {
        let store = Arc::new(ImportOnMergeStore::default());
        HoldingRepository::new(store.clone())
            .save_settings(&Settings {
                pacing_ms: 0,
                ..Settings::default()
            })
            .unwrap();
        let checker = Arc::new(
            StockChecker::with_sources(store.clone(), QuoteSourceRegistry::new(), Vec::new()).unwrap(),
        );
        checker.add_holding(&new("7203", dec!(100), InstrumentType::Equity)).unwrap();
        assert!(store.checker.set(Arc::clone(&checker)).is_ok());

        let status = checker.refresh().await;
        assert!(status.report().unwrap().reconciliation.is_empty());
        assert_eq!(store.join_importer().added, 1);

        let holdings = checker.holdings().unwrap();
        let codes: Vec<&str> = holdings.iter().map(|h| h.code.as_str()).collect();
        assert_eq!(codes, vec!["7203", "AAPL"]);
        assert_eq!(holdings[0].last_value, Some(synthetic_price("7203") * dec!(100)));
        assert_eq!(holdings[1].last_value, None);
        assert_eq!(checker.snapshot().holdings.len(), 2);
    }

    #[test]
    fn removal_is_recorded_before_the_list_is_saved() {
        let store = Arc::new(WriteLogStore::default());
        let checker =
            StockChecker::with_sources(store.clone(), QuoteSourceRegistry::new(), Vec::new()).unwrap();
        let id = checker
            .add_holding(&new("7203", dec!(100), InstrumentType::Equity))
            .unwrap()
            .id()
            .to_string();
        store.take_writes();

        checker.remove_holding(&id).unwrap();
        assert_eq!(store.take_writes(), vec![REMOVED_KEY, HOLDINGS_KEY]);
    }

    #[tokio::test]
    async fn unreadable_list_survives_refresh_and_edits() {
        let store = Arc::new(MemoryStore::new());
        let raw = r#"{"stocks":[{"code":"7203","shares":100}]}"#;
        store.set(HOLDINGS_KEY, raw).unwrap();
        let checker =
            StockChecker::with_sources(store.clone(), QuoteSourceRegistry::new(), Vec::new()).unwrap();

        let status = checker.refresh().await;
        assert!(!status.is_skipped());
        assert!(checker.holdings().is_err());
        assert!(checker.add_holding(&new("6758", dec!(1), InstrumentType::Equity)).is_err());
        assert!(checker.import_json("[]").is_err());
        assert_eq!(store.get(HOLDINGS_KEY).unwrap().as_deref(), Some(raw));
    }
}

// ═══════════════════════════════════════════════════════════════════
// StockChecker facade: edits
// ═══════════════════════════════════════════════════════════════════

mod edits {
    use super::*;

    #[test]
    fn add_publishes_snapshot() {
        let checker = offline_checker();
        let outcome = checker.add_holding(&new("7203", dec!(100), InstrumentType::Equity)).unwrap();
        assert!(matches!(outcome, AddOutcome::Created(_)));
        assert_eq!(checker.snapshot().holdings.len(), 1);
        assert_eq!(checker.holding(outcome.id()).unwrap().code, "7203");
    }

    #[tokio::test]
    async fn adding_same_code_updates_shares_and_value() {
        let checker = offline_checker();
        let created = checker.add_holding(&new("7203", dec!(100), InstrumentType::Equity)).unwrap();
        checker.value_holding(created.id()).await.unwrap();

        let updated = checker.add_holding(&new("7203", dec!(200), InstrumentType::Equity)).unwrap();
        assert_eq!(updated, AddOutcome::SharesUpdated(created.id().to_string()));
        let h = checker.holding(created.id()).unwrap();
        assert_eq!(h.shares, dec!(200));
        assert_eq!(h.last_value, Some(dec!(3440600)));
    }

    #[tokio::test]
    async fn add_valued_resolves_right_away() {
        let source = TableSource::new(&[("0331418A", dec!(12345))]);
        let checker = checker_with(vec![Box::new(source)], Vec::new());
        let h = checker
            .add_holding_valued(&new("0331418A", dec!(10000), InstrumentType::Fund))
            .await
            .unwrap();
        assert_eq!(h.last_price, Some(dec!(12345)));
        assert_eq!(h.last_value, Some(dec!(12345)));
        assert_eq!(checker.snapshot().totals.domestic_fund, dec!(12345));
    }

    #[tokio::test]
    async fn update_shares_revalues_at_last_price() {
        let checker = offline_checker();
        let id = checker
            .add_holding(&new("7203", dec!(100), InstrumentType::Equity))
            .unwrap()
            .id()
            .to_string();
        let unpriced = checker.update_shares(&id, dec!(50)).unwrap();
        assert_eq!(unpriced.last_value, None);

        checker.value_holding(&id).await.unwrap();
        let priced = checker.update_shares(&id, dec!(20)).unwrap();
        assert_eq!(priced.last_price, Some(dec!(17203)));
        assert_eq!(priced.last_value, Some(dec!(344060)));

        assert!(checker.update_shares(&id, dec!(0)).is_err());
        assert!(matches!(
            checker.update_shares("missing", dec!(1)),
            Err(CoreError::HoldingNotFound(_))
        ));
    }

    #[test]
    fn remove_records_tombstone() {
        let store = store_with_pacing(0);
        let checker =
            StockChecker::with_sources(store.clone(), QuoteSourceRegistry::new(), Vec::new()).unwrap();
        let id = checker
            .add_holding(&new("7203", dec!(100), InstrumentType::Equity))
            .unwrap()
            .id()
            .to_string();

        let removed = checker.remove_holding(&id).unwrap();
        assert_eq!(removed.id, id);
        assert!(checker.holdings().unwrap().is_empty());
        assert_eq!(HoldingRepository::new(store).load_tombstones().unwrap(), vec![id.clone()]);
        assert!(checker.remove_holding(&id).is_err());
    }

    #[test]
    fn failed_edit_saves_nothing() {
        let checker = offline_checker();
        checker.add_holding(&new("7203", dec!(100), InstrumentType::Equity)).unwrap();
        assert!(checker.add_holding(&new(" ", dec!(1), InstrumentType::Equity)).is_err());
        assert_eq!(checker.holdings().unwrap().len(), 1);
    }
}

// ═══════════════════════════════════════════════════════════════════
// StockChecker facade: quotes, FX, rebalance, settings
// ═══════════════════════════════════════════════════════════════════

mod facade {
    use super::*;

    #[tokio::test]
    async fn resolve_quote_for_untracked_code() {
        let checker = offline_checker();
        let q = checker
            .resolve_quote("64311081", Market::Domestic, InstrumentType::Fund)
            .await;
        assert!(q.synthetic);
        assert_eq!(q.price, dec!(11081));
        assert!(checker.holdings().unwrap().is_empty());
    }

    #[test]
    fn fx_defaults_to_setting() {
        let checker = offline_checker();
        assert_eq!(checker.fx_rate(), FxRate::fallback(dec!(150)));
    }

    #[test]
    fn persisted_fx_rate_is_restored() {
        let store = store_with_pacing(0);
        HoldingRepository::new(store.clone())
            .save_fx_rate(&FxRate::fallback(dec!(147.5)))
            .unwrap();
        let checker =
            StockChecker::with_sources(store, QuoteSourceRegistry::new(), Vec::new()).unwrap();
        assert_eq!(checker.fx_rate().rate, dec!(147.5));
    }

    #[tokio::test]
    async fn refresh_fx_rate_persists() {
        let fx = CountingFx {
            rate: dec!(152.3),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let store = store_with_pacing(0);
        let checker =
            StockChecker::with_sources(store.clone(), QuoteSourceRegistry::new(), vec![Box::new(fx)])
                .unwrap();
        let rate = checker.refresh_fx_rate().await;
        assert!(rate.is_fetched());
        let stored = HoldingRepository::new(store).load_fx_rate().unwrap().unwrap();
        assert_eq!(stored.rate, dec!(152.3));
    }

    #[tokio::test]
    async fn rebalance_uses_latest_snapshot() {
        let source = TableSource::new(&[("7203", dec!(3000)), ("AAPL", dec!(100))]);
        let checker = checker_with(vec![Box::new(source)], Vec::new());
        checker.add_holding(&new("7203", dec!(200), InstrumentType::Equity)).unwrap();
        checker.add_holding(&new("AAPL", dec!(20), InstrumentType::Equity)).unwrap();
        checker.refresh().await;

        // 600,000 domestic vs 300,000 foreign.
        let plan = checker.rebalance(None).unwrap();
        assert_eq!(plan.total_value, dec!(900000));
        assert_eq!(plan.target_domestic_amount, dec!(450000));
        assert!(!plan.balanced);

        let skewed = checker.rebalance(Some(dec!(66.67))).unwrap();
        assert!(skewed.actions.is_empty());
        assert!(checker.rebalance(Some(dec!(150))).is_err());
    }

    #[test]
    fn update_settings_validates_and_persists() {
        let store = store_with_pacing(0);
        let checker =
            StockChecker::with_sources(store.clone(), QuoteSourceRegistry::new(), Vec::new()).unwrap();

        let bad_rate = Settings {
            default_fx_rate: Decimal::ZERO,
            ..checker.settings()
        };
        assert!(checker.update_settings(bad_rate).is_err());

        let bad_ratio = Settings {
            target_domestic_ratio: dec!(101),
            ..checker.settings()
        };
        assert!(checker.update_settings(bad_ratio).is_err());

        let bad_interval = Settings {
            refresh_interval_minutes: 0,
            ..checker.settings()
        };
        assert!(checker.update_settings(bad_interval).is_err());

        let good = Settings {
            auto_refresh: false,
            target_domestic_ratio: dec!(70),
            ..checker.settings()
        };
        checker.update_settings(good.clone()).unwrap();
        assert_eq!(checker.settings(), good);
        assert_eq!(HoldingRepository::new(store).load_settings().unwrap(), good);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Import / export
// ═══════════════════════════════════════════════════════════════════

mod import_export {
    use super::*;

    #[test]
    fn json_round_trip_between_checkers() {
        let source = offline_checker();
        source.add_holding(&new("7203", dec!(100), InstrumentType::Equity)).unwrap();
        source.add_holding(&new("0331418A", dec!(2500.5), InstrumentType::Fund)).unwrap();
        let json = source.export_json().unwrap();

        let target = offline_checker();
        let summary = target.import_json(&json).unwrap();
        assert_eq!(summary.added, 2);
        assert_eq!(target.holdings().unwrap(), source.holdings().unwrap());

        // Importing the same payload again only skips.
        let again = target.import_json(&json).unwrap();
        assert_eq!(again.added, 0);
        assert_eq!(again.skipped, 2);
    }

    #[test]
    fn transfer_chunks_in_any_order() {
        let source = offline_checker();
        for i in 0..40 {
            source
                .add_holding(&new(&format!("{}", 1000 + i), dec!(100), InstrumentType::Equity))
                .unwrap();
        }
        let chunks = source.export_chunks().unwrap();
        assert!(chunks.len() > 1);

        let mut assembler = ChunkAssembler::new();
        for chunk in chunks.iter().rev() {
            assembler.push_encoded(chunk).unwrap();
        }
        let target = offline_checker();
        let summary = target.import_transfer(&assembler).unwrap();
        assert_eq!(summary.added, 40);
        assert_eq!(target.holdings().unwrap().len(), 40);
    }

    #[test]
    fn incomplete_transfer_is_rejected() {
        let source = offline_checker();
        for i in 0..40 {
            source
                .add_holding(&new(&format!("{}", 2000 + i), dec!(1), InstrumentType::Equity))
                .unwrap();
        }
        let chunks = source.export_chunks().unwrap();
        let mut assembler = ChunkAssembler::new();
        assembler.push_encoded(&chunks[0]).unwrap();

        let target = offline_checker();
        let err = target.import_transfer(&assembler).unwrap_err();
        assert!(matches!(err, CoreError::Transfer(_)));
        assert!(target.holdings().unwrap().is_empty());
    }

    #[test]
    fn legacy_import_counts_invalid_records() {
        let checker = offline_checker();
        let summary = checker
            .import_json(r#"[{"code":"7203","shares":100,"type":"stock"},{"shares":5},{"code":"AAPL","shares":-1}]"#)
            .unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.invalid, 2);
    }
}
