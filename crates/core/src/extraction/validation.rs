//! Sanity checks applied to every extracted candidate.
//!
//! Unstructured pages show many numbers next to the price: the security
//! code itself, net assets "in millions", rankings, percentages. A candidate
//! is rejected when:
//! - it is not strictly positive
//! - it equals the security's own code
//! - its text carries a unit marker of a different quantity class
//! - it is below the minimum plausible price for the instrument class
//! - it is above a global ceiling

use log::debug;
use rust_decimal::Decimal;

use super::Candidate;
use crate::models::holding::{is_numeric_code, Classification, InstrumentType, Market};

/// Markers that tag a number as something other than a unit price.
const DEFAULT_UNIT_MARKERS: &[&str] = &["百万", "億", "位", "%"];

/// Why a candidate was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotPositive,
    MatchesCode,
    UnitMarker(String),
    BelowFloor,
    AboveCeiling,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::NotPositive => write!(f, "not a positive value"),
            Rejection::MatchesCode => write!(f, "equals the security code"),
            Rejection::UnitMarker(marker) => write!(f, "tagged with unit marker '{marker}'"),
            Rejection::BelowFloor => write!(f, "below the minimum plausible price"),
            Rejection::AboveCeiling => write!(f, "above the sanity ceiling"),
        }
    }
}

/// Candidate validator shared by all providers.
#[derive(Debug, Clone)]
pub struct PriceValidator {
    unit_markers: Vec<String>,
    ceiling: Decimal,
    fund_floor: Decimal,
    domestic_equity_floor: Decimal,
    foreign_equity_floor: Decimal,
}

impl Default for PriceValidator {
    fn default() -> Self {
        Self {
            unit_markers: DEFAULT_UNIT_MARKERS.iter().map(|m| m.to_string()).collect(),
            ceiling: Decimal::from(1_000_000_000i64),
            // Fund NAVs are quoted per 10,000 units and sit in the thousands.
            fund_floor: Decimal::from(100),
            domestic_equity_floor: Decimal::ONE,
            foreign_equity_floor: Decimal::new(1, 2),
        }
    }
}

impl PriceValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the unit marker list.
    pub fn with_unit_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unit_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Minimum plausible price for a classification.
    pub fn floor_for(&self, class: Classification) -> Decimal {
        match (class.instrument, class.market) {
            (InstrumentType::Fund, _) => self.fund_floor,
            (InstrumentType::Equity, Market::Domestic) => self.domestic_equity_floor,
            (InstrumentType::Equity, Market::Foreign) => self.foreign_equity_floor,
        }
    }

    /// Build the per-lookup check used by the extraction chain.
    pub fn check_for<'a>(&'a self, code: &'a str, class: Classification) -> PriceCheck<'a> {
        PriceCheck {
            validator: self,
            code,
            floor: self.floor_for(class),
        }
    }

    /// Accept or reject one candidate.
    pub fn validate(&self, candidate: &Candidate, code: &str, floor: Decimal) -> Result<Decimal, Rejection> {
        let value = candidate.value;
        if value <= Decimal::ZERO {
            return Err(Rejection::NotPositive);
        }
        if matches_code(candidate, code) {
            return Err(Rejection::MatchesCode);
        }
        if let Some(marker) = self
            .unit_markers
            .iter()
            .find(|m| candidate.text.contains(m.as_str()))
        {
            return Err(Rejection::UnitMarker(marker.clone()));
        }
        if value < floor {
            return Err(Rejection::BelowFloor);
        }
        if value > self.ceiling {
            return Err(Rejection::AboveCeiling);
        }
        Ok(value)
    }
}

/// Validation bound to one code and classification.
pub struct PriceCheck<'a> {
    validator: &'a PriceValidator,
    code: &'a str,
    floor: Decimal,
}

impl PriceCheck<'_> {
    pub fn code(&self) -> &str {
        self.code
    }

    pub fn floor(&self) -> Decimal {
        self.floor
    }

    /// `Some(price)` when the candidate passes; rejections are logged.
    pub fn accept(&self, strategy: &str, candidate: &Candidate) -> Option<Decimal> {
        match self.validator.validate(candidate, self.code, self.floor) {
            Ok(value) => Some(value),
            Err(reason) => {
                debug!(
                    "Rejected '{}' from {strategy} for {}: {reason}",
                    candidate.text, self.code
                );
                None
            }
        }
    }
}

fn matches_code(candidate: &Candidate, code: &str) -> bool {
    let code = code.trim();
    if code.is_empty() {
        return false;
    }
    let digits: String = candidate
        .text
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '$' | '円' | '¥'))
        .collect();
    if digits == code {
        return true;
    }
    is_numeric_code(code)
        && code
            .parse::<Decimal>()
            .map(|c| c == candidate.value)
            .unwrap_or(false)
}
