use log::{debug, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::CoreError;
use crate::models::holding::{validate_shares, Holding, InstrumentType, Market, NewHolding};
use crate::models::settings::Settings;
use crate::storage::migration::{holding_from_record, CurrencyPair};

/// What `add_holding` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "id")]
pub enum AddOutcome {
    /// A new holding was appended.
    Created(String),
    /// A holding with the same code existed; its shares were replaced.
    SharesUpdated(String),
}

impl AddOutcome {
    pub fn id(&self) -> &str {
        match self {
            AddOutcome::Created(id) | AddOutcome::SharesUpdated(id) => id,
        }
    }
}

/// Counts reported by `import_records`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub added: usize,
    /// Records whose code is already tracked.
    pub skipped: usize,
    /// Records without a usable code or shares.
    pub invalid: usize,
}

/// Edits the holdings list on behalf of the user.
///
/// Pure business logic over a `Vec<Holding>`: no I/O, no network. Callers
/// persist the list afterwards.
pub struct PortfolioService;

impl PortfolioService {
    pub fn new() -> Self {
        Self
    }

    /// Add a holding. A code already in the list (compared
    /// case-insensitively) updates that holding's shares instead of adding
    /// a duplicate.
    pub fn add_holding(
        &self,
        holdings: &mut Vec<Holding>,
        new: &NewHolding,
        settings: &Settings,
    ) -> Result<AddOutcome, CoreError> {
        let holding = Holding::create(new, &settings.reporting_currency, &settings.foreign_currency)?;

        if let Some(existing) = holdings
            .iter_mut()
            .find(|h| h.code.eq_ignore_ascii_case(&holding.code))
        {
            debug!("{} already tracked; updating shares to {}", existing.code, holding.shares);
            existing.shares = holding.shares;
            return Ok(AddOutcome::SharesUpdated(existing.id.clone()));
        }

        let id = holding.id.clone();
        holdings.push(holding);
        Ok(AddOutcome::Created(id))
    }

    /// Replace the share/unit count of a holding.
    pub fn update_shares(&self, holdings: &mut [Holding], id: &str, shares: Decimal) -> Result<(), CoreError> {
        validate_shares(shares)?;
        let holding = find_mut(holdings, id)?;
        holding.shares = shares;
        Ok(())
    }

    /// Remove a holding and return it so the caller can record a tombstone.
    pub fn remove_holding(&self, holdings: &mut Vec<Holding>, id: &str) -> Result<Holding, CoreError> {
        let idx = holdings
            .iter()
            .position(|h| h.id == id)
            .ok_or_else(|| CoreError::HoldingNotFound(id.to_string()))?;
        Ok(holdings.remove(idx))
    }

    /// Set the market by hand. The choice sticks: automatic reclassification
    /// never overrides a pinned market.
    pub fn pin_market(
        &self,
        holdings: &mut [Holding],
        id: &str,
        market: Market,
        settings: &Settings,
    ) -> Result<(), CoreError> {
        let holding = find_mut(holdings, id)?;
        let (old_currency, old_market) = holding.pricing_basis();
        let before = (old_currency.to_string(), old_market);

        holding.market = market;
        holding.user_pinned_market = true;
        holding.currency = match (holding.instrument_type, holding.effective_market()) {
            (InstrumentType::Equity, Market::Foreign) => settings.foreign_currency.clone(),
            _ => settings.reporting_currency.clone(),
        };

        // The last price was quoted for the old market.
        let repriced = holding.pricing_basis() != (before.0.as_str(), before.1);
        if repriced {
            holding.clear_quote();
        }
        Ok(())
    }

    /// Merge imported records. Unknown codes are appended, codes already in
    /// the list are skipped, unusable records are counted and dropped.
    pub fn import_records(&self, holdings: &mut Vec<Holding>, records: &[Value], settings: &Settings) -> ImportSummary {
        let currencies = CurrencyPair {
            reporting: &settings.reporting_currency,
            foreign: &settings.foreign_currency,
        };
        let mut summary = ImportSummary::default();

        for record in records {
            let mut holding = match holding_from_record(record, &currencies) {
                Ok(holding) => holding,
                Err(e) => {
                    warn!("Skipping imported record: {e}");
                    summary.invalid += 1;
                    continue;
                }
            };
            if holdings.iter().any(|h| h.code.eq_ignore_ascii_case(&holding.code)) {
                summary.skipped += 1;
                continue;
            }
            if holdings.iter().any(|h| h.id == holding.id) {
                holding.id = uuid::Uuid::new_v4().to_string();
            }
            holdings.push(holding);
            summary.added += 1;
        }
        summary
    }

    /// Parse and merge a JSON array of records.
    pub fn import_json(&self, holdings: &mut Vec<Holding>, json: &str, settings: &Settings) -> Result<ImportSummary, CoreError> {
        let records: Vec<Value> = serde_json::from_str(json)?;
        Ok(self.import_records(holdings, &records, settings))
    }

    /// The holdings list as a JSON array.
    pub fn export_json(&self, holdings: &[Holding]) -> Result<String, CoreError> {
        serde_json::to_string(holdings)
            .map_err(|e| CoreError::Serialization(format!("Failed to export holdings: {e}")))
    }
}

impl Default for PortfolioService {
    fn default() -> Self {
        Self::new()
    }
}

fn find_mut<'a>(holdings: &'a mut [Holding], id: &str) -> Result<&'a mut Holding, CoreError> {
    holdings
        .iter_mut()
        .find(|h| h.id == id)
        .ok_or_else(|| CoreError::HoldingNotFound(id.to_string()))
}
