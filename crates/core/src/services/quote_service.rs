use log::{debug, warn};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::models::holding::{classify, Classification, InstrumentType, Market};
use crate::models::quote::{QuoteResult, ResolvedQuote, SYNTHETIC_SOURCE_ID};
use crate::providers::registry::QuoteSourceRegistry;

/// Base of every synthetic price; the code adds 0–9999 on top.
const SYNTHETIC_BASE: i64 = 10_000;

/// Resolves a trustworthy price for a code from the registered sources.
///
/// Three outcomes, never an error:
/// - the first source (in priority order) with a validated price wins
/// - metadata the winner lacks is filled in from the other sources consulted
/// - when every source comes back empty, a deterministic synthetic price
///   derived from the code is returned with `synthetic = true`
pub struct QuoteResolver {
    registry: QuoteSourceRegistry,
    reporting_currency: String,
    foreign_currency: String,
    /// Ask one more source for a display name when the winner had none.
    metadata_lookahead: bool,
}

impl QuoteResolver {
    pub fn new(registry: QuoteSourceRegistry) -> Self {
        Self {
            registry,
            reporting_currency: "JPY".to_string(),
            foreign_currency: "USD".to_string(),
            metadata_lookahead: true,
        }
    }

    pub fn with_currencies(mut self, reporting: impl Into<String>, foreign: impl Into<String>) -> Self {
        self.reporting_currency = reporting.into();
        self.foreign_currency = foreign.into();
        self
    }

    pub fn with_metadata_lookahead(mut self, enabled: bool) -> Self {
        self.metadata_lookahead = enabled;
        self
    }

    /// Check if at least one source is registered for a classification.
    pub fn has_source_for(&self, class: Classification) -> bool {
        !self.registry.sources_for(class).is_empty()
    }

    /// Ids of the sources tried for a classification, in order.
    pub fn source_ids(&self, class: Classification) -> Vec<String> {
        self.registry.source_ids_for(class)
    }

    /// Quote currency for a normalized classification.
    pub fn currency_for(&self, market: Market, instrument: InstrumentType) -> &str {
        match (instrument, market) {
            (InstrumentType::Equity, Market::Foreign) => &self.foreign_currency,
            _ => &self.reporting_currency,
        }
    }

    /// Resolve one code.
    ///
    /// Numeric-only codes are resolved as domestic whatever `market` says.
    pub async fn resolve(&self, code: &str, market: Market, instrument: InstrumentType) -> ResolvedQuote {
        let code = code.trim();
        let market = classify(code, market);
        let class = Classification::new(market, instrument);
        let currency = self.currency_for(market, instrument).to_string();
        let sources = self.registry.sources_for(class);

        let mut consulted: Vec<QuoteResult> = Vec::new();
        let mut winner: Option<(Decimal, QuoteResult)> = None;
        let mut next = 0;

        while next < sources.len() {
            let source = sources[next];
            next += 1;
            debug!("Trying {} for {code} ({class})", source.id());
            let result = source.fetch(code, market, instrument).await;
            match result.price {
                Some(price) => {
                    winner = Some((price, result));
                    break;
                }
                None => consulted.push(result),
            }
        }

        let Some((price, result)) = winner else {
            warn!(
                "No source returned a price for {code} ({class}); using a synthetic quote"
            );
            return ResolvedQuote {
                code: code.to_string(),
                price: synthetic_price(code),
                currency,
                display_name: first_metadata(&consulted, |r| r.display_name.as_ref()),
                change_text: None,
                source_id: SYNTHETIC_SOURCE_ID.to_string(),
                source_url: consulted
                    .first()
                    .map(|r| r.fetched_url.clone())
                    .unwrap_or_default(),
                synthetic: true,
            };
        };

        let mut display_name = result
            .display_name
            .clone()
            .or_else(|| first_metadata(&consulted, |r| r.display_name.as_ref()));
        let mut change_text = result
            .change_text
            .clone()
            .or_else(|| first_metadata(&consulted, |r| r.change_text.as_ref()));

        if display_name.is_none() && self.metadata_lookahead {
            if let Some(source) = sources.get(next) {
                debug!("Asking {} for metadata of {code}", source.id());
                let extra = source.fetch(code, market, instrument).await;
                display_name = extra.display_name;
                change_text = change_text.or(extra.change_text);
            }
        }

        debug!("Resolved {code} at {price} from {}", result.source_id);
        ResolvedQuote {
            code: code.to_string(),
            price,
            currency,
            display_name,
            change_text,
            source_id: result.source_id,
            source_url: result.fetched_url,
            synthetic: false,
        }
    }
}

/// Deterministic placeholder price for a code: `10000 + n`, where `n` is the
/// code's last four digits when it ends in four digits, and otherwise the
/// first eight bytes of its SHA-256 modulo 10000.
pub fn synthetic_price(code: &str) -> Decimal {
    let code = code.trim();
    let tail: String = code.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();

    let offset = if tail.len() == 4 && tail.bytes().all(|b| b.is_ascii_digit()) {
        tail.parse::<u64>().unwrap_or_default() % 10_000
    } else {
        let digest = Sha256::digest(code.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(head) % 10_000
    };

    Decimal::from(SYNTHETIC_BASE) + Decimal::from(offset)
}

fn first_metadata<F>(results: &[QuoteResult], field: F) -> Option<String>
where
    F: Fn(&QuoteResult) -> Option<&String>,
{
    results.iter().find_map(|r| field(r).cloned())
}
