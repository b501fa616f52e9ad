use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoreError;

/// Which market a holding belongs to.
/// Determines the quote currency and which side of the rebalance it counts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    /// Listed at home, quoted in the reporting currency.
    Domestic,
    /// Listed abroad, quoted in the foreign currency and converted with the FX rate.
    Foreign,
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Market::Domestic => write!(f, "Domestic"),
            Market::Foreign => write!(f, "Foreign"),
        }
    }
}

impl std::str::FromStr for Market {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "domestic" | "jp" => Ok(Market::Domestic),
            "foreign" | "us" => Ok(Market::Foreign),
            other => Err(CoreError::validation("market", format!("unknown market '{other}'"))),
        }
    }
}

/// The kind of security. Determines the valuation formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentType {
    /// Listed shares, valued as price × shares.
    Equity,
    /// Mutual funds, quoted per 10,000 units.
    Fund,
}

impl std::fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstrumentType::Equity => write!(f, "Equity"),
            InstrumentType::Fund => write!(f, "Fund"),
        }
    }
}

impl std::str::FromStr for InstrumentType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equity" | "stock" => Ok(InstrumentType::Equity),
            "fund" => Ok(InstrumentType::Fund),
            other => Err(CoreError::validation(
                "instrumentType",
                format!("unknown instrument type '{other}'"),
            )),
        }
    }
}

/// A (market, instrument type) pair. Providers are registered per classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Classification {
    pub market: Market,
    pub instrument: InstrumentType,
}

impl Classification {
    pub const DOMESTIC_EQUITY: Self = Self::new(Market::Domestic, InstrumentType::Equity);
    pub const FOREIGN_EQUITY: Self = Self::new(Market::Foreign, InstrumentType::Equity);
    pub const DOMESTIC_FUND: Self = Self::new(Market::Domestic, InstrumentType::Fund);
    pub const FOREIGN_FUND: Self = Self::new(Market::Foreign, InstrumentType::Fund);

    pub const fn new(market: Market, instrument: InstrumentType) -> Self {
        Self { market, instrument }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.market, self.instrument)
    }
}

/// True when the code consists of ASCII digits only (e.g. "7203", "64311081").
pub fn is_numeric_code(code: &str) -> bool {
    !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit())
}

/// Market used for quote resolution and valuation.
///
/// Numeric-only codes are domestic by convention, so they resolve as
/// `Domestic` whatever the hint says. Any other code keeps the hint.
pub fn classify(code: &str, hint: Market) -> Market {
    if is_numeric_code(code.trim()) {
        Market::Domestic
    } else {
        hint
    }
}

/// Market stored on a newly created holding.
///
/// - an explicitly chosen market is kept as-is (and pinned by the caller)
/// - numeric codes default to `Domestic`
/// - all-uppercase letter tickers ("AAPL") default to `Foreign`
/// - anything else falls back to `Domestic`
pub fn derive_market(code: &str, requested: Option<Market>) -> Market {
    if let Some(market) = requested {
        return market;
    }
    let code = code.trim();
    if is_numeric_code(code) {
        Market::Domestic
    } else if !code.is_empty() && code.bytes().all(|b| b.is_ascii_uppercase()) {
        Market::Foreign
    } else {
        Market::Domestic
    }
}

/// One tracked security position.
///
/// Identity is `id`. A refresh only ever touches the `last_*` fields; code,
/// shares and classification belong to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub id: String,

    /// Lookup key passed to the resolver (ticker, fund code…)
    pub code: String,

    pub instrument_type: InstrumentType,

    pub market: Market,

    /// Shares for equities, units for funds. Always positive.
    pub shares: Decimal,

    /// Quote currency (e.g. "JPY", "USD")
    pub currency: String,

    #[serde(default)]
    pub user_pinned_market: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_price: Option<Decimal>,

    /// Value in the reporting currency as of the last refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_value: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_source_id: Option<String>,

    /// Whether `last_price` is a synthetic placeholder.
    #[serde(default)]
    pub last_synthetic: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl Holding {
    /// Validate and build a new holding with a fresh id.
    pub fn create(new: &NewHolding, reporting_currency: &str, foreign_currency: &str) -> Result<Self, CoreError> {
        let code = validate_code(&new.code)?;
        validate_shares(new.shares)?;

        let market = derive_market(&code, new.market);
        let currency = match (new.instrument_type, classify(&code, market)) {
            (InstrumentType::Equity, Market::Foreign) => foreign_currency.to_string(),
            _ => reporting_currency.to_string(),
        };

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            code,
            instrument_type: new.instrument_type,
            market,
            shares: new.shares,
            currency,
            user_pinned_market: new.market.is_some(),
            display_name: None,
            last_price: None,
            last_value: None,
            change_text: None,
            last_source_id: None,
            last_synthetic: false,
            last_updated_at: None,
        })
    }

    pub fn classification(&self) -> Classification {
        Classification::new(self.market, self.instrument_type)
    }

    /// Market the resolver and valuation engine work with (see [`classify`]).
    pub fn effective_market(&self) -> Market {
        classify(&self.code, self.market)
    }

    /// Quote currency and valuation market, the pair a stored price depends on.
    pub fn pricing_basis(&self) -> (&str, Market) {
        (&self.currency, self.effective_market())
    }

    /// Forget the last quote and value, e.g. once they were quoted in a
    /// currency the holding no longer uses. The display name is kept.
    pub fn clear_quote(&mut self) {
        self.last_price = None;
        self.last_value = None;
        self.change_text = None;
        self.last_source_id = None;
        self.last_synthetic = false;
        self.last_updated_at = None;
    }

    /// Re-check the user-owned fields, e.g. for records read back from storage.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_code(&self.code)?;
        validate_shares(self.shares)
    }
}

/// Input for creating a holding from the edit form or an API call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHolding {
    pub code: String,
    pub shares: Decimal,
    pub instrument_type: InstrumentType,
    /// Explicit user choice; `None` lets the code shape decide.
    #[serde(default)]
    pub market: Option<Market>,
}

pub(crate) fn validate_code(code: &str) -> Result<String, CoreError> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation("code", "security code is required"));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn validate_shares(shares: Decimal) -> Result<(), CoreError> {
    if shares <= Decimal::ZERO {
        return Err(CoreError::validation(
            "shares",
            format!("must be greater than zero (got {shares})"),
        ));
    }
    Ok(())
}
