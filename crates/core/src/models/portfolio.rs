use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::holding::{Holding, InstrumentType, Market};

/// Aggregate values in the reporting currency, split by market and instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketTotals {
    pub domestic_equity: Decimal,
    pub foreign_equity: Decimal,
    pub domestic_fund: Decimal,
    pub foreign_fund: Decimal,
    pub domestic_total: Decimal,
    pub foreign_total: Decimal,
    pub grand_total: Decimal,
}

impl MarketTotals {
    /// Sum `last_value` of every holding into its (market, instrument) bucket.
    /// Holdings that were never valued count as zero.
    pub fn from_holdings(holdings: &[Holding]) -> Self {
        let mut totals = Self::default();
        for holding in holdings {
            let Some(value) = holding.last_value else {
                continue;
            };
            match (holding.market, holding.instrument_type) {
                (Market::Domestic, InstrumentType::Equity) => totals.domestic_equity += value,
                (Market::Foreign, InstrumentType::Equity) => totals.foreign_equity += value,
                (Market::Domestic, InstrumentType::Fund) => totals.domestic_fund += value,
                (Market::Foreign, InstrumentType::Fund) => totals.foreign_fund += value,
            }
        }
        totals.domestic_total = totals.domestic_equity + totals.domestic_fund;
        totals.foreign_total = totals.foreign_equity + totals.foreign_fund;
        totals.grand_total = totals.domestic_total + totals.foreign_total;
        totals
    }

    pub fn for_market(&self, market: Market) -> Decimal {
        match market {
            Market::Domestic => self.domestic_total,
            Market::Foreign => self.foreign_total,
        }
    }
}

/// The holdings list plus totals derived from it. Never mutated on its own;
/// rebuild it with [`PortfolioSnapshot::from_holdings`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    pub holdings: Vec<Holding>,
    pub totals: MarketTotals,
    /// FX rate the values were computed with.
    pub fx_rate: Decimal,
    /// Number of holdings valued from a synthetic quote.
    pub synthetic_count: usize,
}

impl PortfolioSnapshot {
    pub fn from_holdings(holdings: Vec<Holding>, fx_rate: Decimal) -> Self {
        let totals = MarketTotals::from_holdings(&holdings);
        let synthetic_count = holdings.iter().filter(|h| h.last_synthetic).count();
        Self {
            holdings,
            totals,
            fx_rate,
            synthetic_count,
        }
    }
}
