use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What one source provider returned for one code.
///
/// `price == None` is a normal outcome meaning "try the next provider".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResult {
    pub price: Option<Decimal>,
    pub change_text: Option<String>,
    pub display_name: Option<String>,
    pub source_id: String,
    pub fetched_url: String,
}

impl QuoteResult {
    /// A result without a price (transport failure, nothing extractable…).
    pub fn absent(source_id: impl Into<String>, fetched_url: impl Into<String>) -> Self {
        Self {
            price: None,
            change_text: None,
            display_name: None,
            source_id: source_id.into(),
            fetched_url: fetched_url.into(),
        }
    }

    pub fn has_price(&self) -> bool {
        self.price.is_some()
    }
}

/// Final answer of the quote resolver. Always carries a price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedQuote {
    pub code: String,
    pub price: Decimal,
    pub currency: String,
    pub display_name: Option<String>,
    pub change_text: Option<String>,
    pub source_id: String,
    pub source_url: String,
    /// Deterministic placeholder derived from the code; no provider answered.
    pub synthetic: bool,
}

/// Source id used for synthetic quotes.
pub const SYNTHETIC_SOURCE_ID: &str = "synthetic";

/// The process-wide exchange rate (foreign → reporting currency).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FxRate {
    pub rate: Decimal,
    /// `None` until a fetch has succeeded at least once.
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl FxRate {
    pub fn fallback(rate: Decimal) -> Self {
        Self {
            rate,
            fetched_at: None,
        }
    }

    pub fn is_fetched(&self) -> bool {
        self.fetched_at.is_some()
    }
}
