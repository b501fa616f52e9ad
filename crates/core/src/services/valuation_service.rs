use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::holding::{Holding, InstrumentType, Market};
use crate::models::quote::ResolvedQuote;

/// Fund prices are quoted per this many units.
pub const FUND_QUOTE_UNITS: i64 = 10_000;

/// Values holdings in the reporting currency.
///
/// Pure arithmetic, no I/O. Every path that puts a value on a holding (add,
/// edit, refresh, reconciliation) goes through here.
///
/// Rules, in precedence order:
/// 1. Fund: `price × shares / 10000`
/// 2. Foreign equity (foreign market and not numeric-coded): `price × shares × fx`
/// 3. Anything else: `price × shares`
///
/// Only the final result is rounded, half away from zero, to whole units.
pub struct ValuationService;

impl ValuationService {
    pub fn new() -> Self {
        Self
    }

    /// Value of `holding` at a resolved quote.
    pub fn value(&self, quote: &ResolvedQuote, holding: &Holding, fx_rate: Decimal) -> Decimal {
        self.value_at_price(quote.price, holding, fx_rate)
    }

    /// Value of `holding` at an explicit price (e.g. its last known one).
    pub fn value_at_price(&self, price: Decimal, holding: &Holding, fx_rate: Decimal) -> Decimal {
        let raw = match (holding.instrument_type, holding.effective_market()) {
            (InstrumentType::Fund, _) => price * holding.shares / Decimal::from(FUND_QUOTE_UNITS),
            (InstrumentType::Equity, Market::Foreign) => price * holding.shares * fx_rate,
            (InstrumentType::Equity, Market::Domestic) => price * holding.shares,
        };
        round_value(raw)
    }

    /// Store a quote and the value it implies on the holding.
    ///
    /// Only the `last_*`, name and change fields change; code, shares and
    /// classification stay as the user set them.
    pub fn apply_quote(&self, holding: &mut Holding, quote: &ResolvedQuote, fx_rate: Decimal, now: DateTime<Utc>) {
        holding.last_value = Some(self.value(quote, holding, fx_rate));
        holding.last_price = Some(quote.price);
        holding.last_source_id = Some(quote.source_id.clone());
        holding.last_synthetic = quote.synthetic;
        holding.last_updated_at = Some(now);
        if let Some(name) = &quote.display_name {
            holding.display_name = Some(name.clone());
        }
        if let Some(change) = &quote.change_text {
            holding.change_text = Some(change.clone());
        }
    }

    /// Recompute `last_value` from `last_price`, e.g. after shares changed.
    /// Holdings that were never priced are left untouched.
    pub fn revalue(&self, holding: &mut Holding, fx_rate: Decimal) {
        if let Some(price) = holding.last_price {
            holding.last_value = Some(self.value_at_price(price, holding, fx_rate));
        }
    }
}

impl Default for ValuationService {
    fn default() -> Self {
        Self::new()
    }
}

/// Round half away from zero to whole currency units.
pub fn round_value(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}
