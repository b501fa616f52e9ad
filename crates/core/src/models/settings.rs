use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Default USD/JPY rate used until a fetch succeeds.
pub const DEFAULT_FX_RATE: i64 = 150;

/// User-configurable settings, stored under their own key in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Currency all values are reported in (e.g., "JPY").
    pub reporting_currency: String,

    /// Quote currency of foreign equities (e.g., "USD").
    pub foreign_currency: String,

    /// Rate used when no FX fetch has ever succeeded.
    pub default_fx_rate: Decimal,

    /// Delay between two holdings in a refresh, in milliseconds.
    pub pacing_ms: u64,

    /// Per-request timeout for source providers, in seconds.
    pub request_timeout_secs: u64,

    pub auto_refresh: bool,

    pub refresh_interval_minutes: u64,

    /// Target share of domestic investments, 0–100.
    pub target_domestic_ratio: Decimal,

    /// Differences below this amount don't trigger a rebalance action.
    pub rebalance_threshold: Decimal,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reporting_currency: "JPY".to_string(),
            foreign_currency: "USD".to_string(),
            default_fx_rate: Decimal::from(DEFAULT_FX_RATE),
            pacing_ms: 500,
            request_timeout_secs: 10,
            auto_refresh: true,
            refresh_interval_minutes: 10,
            target_domestic_ratio: Decimal::from(50),
            rebalance_threshold: Decimal::from(10_000),
        }
    }
}
