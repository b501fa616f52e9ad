//! Conversion of stored or imported JSON records into [`Holding`]s.
//!
//! Two record shapes are accepted:
//! - the current camelCase `Holding` shape (`instrumentType`, `market`, …)
//! - the legacy shape (`type: "stock" | "fund"`, `country: "JP" | "US"`,
//!   `price` as display text, `name`), with `country` possibly missing
//!
//! Rules applied to every record:
//! - a missing market is derived: funds are domestic, equities follow their currency
//! - a record quoted in the foreign currency is foreign unless the user pinned its market
//! - a record without an id gets a fresh one

use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::extraction::parse_number;
use crate::models::holding::{
    derive_market, validate_code, validate_shares, Holding, InstrumentType, Market,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawRecord {
    id: Option<String>,
    code: Option<String>,
    shares: Option<Value>,
    instrument_type: Option<String>,
    #[serde(rename = "type")]
    legacy_type: Option<String>,
    market: Option<String>,
    country: Option<String>,
    currency: Option<String>,
    user_pinned_market: Option<bool>,
    display_name: Option<String>,
    name: Option<String>,
    last_price: Option<Value>,
    price: Option<Value>,
    last_value: Option<Value>,
    value: Option<Value>,
    change_text: Option<String>,
    last_source_id: Option<String>,
    last_synthetic: Option<bool>,
    last_updated_at: Option<String>,
    last_updated: Option<String>,
}

/// Currencies that mark a record as domestic or foreign.
pub struct CurrencyPair<'a> {
    pub reporting: &'a str,
    pub foreign: &'a str,
}

/// Turn one JSON record into a holding. The record must carry at least a
/// code and positive shares.
pub fn holding_from_record(record: &Value, currencies: &CurrencyPair<'_>) -> Result<Holding, CoreError> {
    let raw: RawRecord = serde_json::from_value(record.clone())?;

    let code = validate_code(raw.code.as_deref().unwrap_or_default())?;
    let shares = raw
        .shares
        .as_ref()
        .and_then(decimal_from_value)
        .ok_or_else(|| CoreError::validation("shares", "missing or not a number"))?;
    validate_shares(shares)?;

    let instrument_type = match raw.instrument_type.as_deref().or(raw.legacy_type.as_deref()) {
        Some(kind) => InstrumentType::from_str(kind)?,
        None => InstrumentType::Equity,
    };

    let explicit_market = match raw.market.as_deref().or(raw.country.as_deref()) {
        Some(market) => Some(Market::from_str(market)?),
        None => None,
    };
    let pinned = raw.user_pinned_market.unwrap_or(false);

    let mut market = match explicit_market {
        Some(market) => market,
        None => match (instrument_type, raw.currency.as_deref()) {
            (InstrumentType::Fund, _) => Market::Domestic,
            (InstrumentType::Equity, Some(currency)) if currency.eq_ignore_ascii_case(currencies.foreign) => {
                Market::Foreign
            }
            (InstrumentType::Equity, Some(_)) => Market::Domestic,
            (InstrumentType::Equity, None) => derive_market(&code, None),
        },
    };

    let quoted_in_foreign = raw
        .currency
        .as_deref()
        .is_some_and(|c| c.eq_ignore_ascii_case(currencies.foreign));
    if quoted_in_foreign && market != Market::Foreign && !pinned {
        debug!("Reclassifying {code} as Foreign (quoted in {})", currencies.foreign);
        market = Market::Foreign;
    }

    let currency = raw.currency.clone().unwrap_or_else(|| {
        match (instrument_type, market) {
            (InstrumentType::Equity, Market::Foreign) => currencies.foreign.to_string(),
            _ => currencies.reporting.to_string(),
        }
    });

    let last_updated_at = raw
        .last_updated_at
        .as_deref()
        .or(raw.last_updated.as_deref())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(Holding {
        id: raw
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        code,
        instrument_type,
        market,
        shares,
        currency,
        user_pinned_market: pinned,
        display_name: raw.display_name.or(raw.name).filter(|n| !n.trim().is_empty()),
        last_price: raw
            .last_price
            .as_ref()
            .or(raw.price.as_ref())
            .and_then(decimal_from_value),
        last_value: raw
            .last_value
            .as_ref()
            .or(raw.value.as_ref())
            .and_then(decimal_from_value),
        change_text: raw.change_text,
        last_source_id: raw.last_source_id,
        last_synthetic: raw.last_synthetic.unwrap_or(false),
        last_updated_at,
    })
}

/// Accept JSON numbers and display strings like "1,234円" or "$12.50".
fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}
