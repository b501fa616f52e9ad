use std::sync::{Arc, Mutex, MutexGuard};

use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::CoreError;
use crate::models::holding::Holding;
use crate::models::quote::FxRate;
use crate::models::settings::Settings;

use super::migration::{holding_from_record, CurrencyPair};
use super::store::KeyValueStore;

pub const HOLDINGS_KEY: &str = "stockList";
pub const FX_RATE_KEY: &str = "exchangeRate";
pub const SETTINGS_KEY: &str = "settings";
pub const REMOVED_KEY: &str = "removedHoldings";

/// Removal tombstones kept; older ones are dropped first.
pub const MAX_TOMBSTONES: usize = 256;

/// Typed access to the key-value store: holdings, FX rate, settings and
/// removal tombstones.
///
/// Clones share one list lock. Every writer of the holdings list (user
/// edits, the end of a refresh) holds it from its read to its save.
#[derive(Clone)]
pub struct HoldingRepository {
    store: Arc<dyn KeyValueStore>,
    list_lock: Arc<Mutex<()>>,
}

impl HoldingRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            list_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Exclusive access to the holdings list for one read-modify-write cycle.
    pub fn lock_list(&self) -> Result<MutexGuard<'_, ()>, CoreError> {
        self.list_lock
            .lock()
            .map_err(|_| CoreError::Storage("holdings list lock poisoned".into()))
    }

    /// Load the holdings list, migrating legacy records.
    ///
    /// A stored value that is not a JSON array is an error, so nothing gets
    /// saved over it. Single records that cannot be read are skipped with a
    /// warning so one bad entry never hides the rest of the portfolio.
    pub fn load_holdings(&self) -> Result<Vec<Holding>, CoreError> {
        let Some(text) = self.store.get(HOLDINGS_KEY)? else {
            return Ok(Vec::new());
        };
        let records: Vec<Value> = serde_json::from_str(&text).map_err(|e| {
            CoreError::Storage(format!("Stored holdings list ({HOLDINGS_KEY}) is unreadable: {e}"))
        })?;

        let settings = self.load_settings()?;
        let currencies = CurrencyPair {
            reporting: &settings.reporting_currency,
            foreign: &settings.foreign_currency,
        };

        let mut holdings = Vec::with_capacity(records.len());
        for record in &records {
            match holding_from_record(record, &currencies) {
                Ok(holding) => holdings.push(holding),
                Err(e) => warn!("Skipping stored holding record: {e}"),
            }
        }
        if holdings.len() != records.len() {
            info!("Loaded {} of {} stored holdings", holdings.len(), records.len());
        }
        Ok(holdings)
    }

    pub fn save_holdings(&self, holdings: &[Holding]) -> Result<(), CoreError> {
        self.write(HOLDINGS_KEY, holdings)
    }

    pub fn load_fx_rate(&self) -> Result<Option<FxRate>, CoreError> {
        let Some(text) = self.store.get(FX_RATE_KEY)? else {
            return Ok(None);
        };
        // Older data stored the bare number.
        if let Ok(rate) = serde_json::from_str::<FxRate>(&text) {
            return Ok(Some(rate));
        }
        Ok(crate::extraction::parse_number(&text)
            .filter(|rate| !rate.is_sign_negative() && !rate.is_zero())
            .map(FxRate::fallback))
    }

    pub fn save_fx_rate(&self, rate: &FxRate) -> Result<(), CoreError> {
        self.write(FX_RATE_KEY, rate)
    }

    /// Stored settings, or the defaults when none were saved yet.
    pub fn load_settings(&self) -> Result<Settings, CoreError> {
        Ok(self.read(SETTINGS_KEY)?.unwrap_or_default())
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), CoreError> {
        self.write(SETTINGS_KEY, settings)
    }

    /// Ids of holdings the user removed, oldest first.
    pub fn load_tombstones(&self) -> Result<Vec<String>, CoreError> {
        Ok(self.read(REMOVED_KEY)?.unwrap_or_default())
    }

    pub fn add_tombstone(&self, id: &str) -> Result<(), CoreError> {
        let mut ids = self.load_tombstones()?;
        if ids.iter().any(|known| known == id) {
            return Ok(());
        }
        ids.push(id.to_string());
        if ids.len() > MAX_TOMBSTONES {
            let excess = ids.len() - MAX_TOMBSTONES;
            ids.drain(..excess);
        }
        self.write(REMOVED_KEY, &ids)
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CoreError> {
        match self.store.get(key)? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), CoreError> {
        let text = serde_json::to_string(value)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize {key}: {e}")))?;
        self.store.set(key, &text)
    }
}
