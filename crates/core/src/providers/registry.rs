use std::time::Duration;

use log::warn;

use crate::models::holding::Classification;

use super::html_source::HtmlQuoteSource;
use super::sources;
use super::traits::QuoteSource;

/// Registry of all available quote sources.
///
/// Sources are kept in registration order, which is also the priority order
/// the resolver walks for a classification. New sources can be added without
/// modifying the resolver.
pub struct QuoteSourceRegistry {
    sources: Vec<Box<dyn QuoteSource>>,
}

impl QuoteSourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Create a registry with every shipped source, in priority order:
    ///
    /// - domestic equities: Yahoo Finance Japan, then Google Finance (TYO)
    /// - foreign equities: Google Finance (NASDAQ), Yahoo Finance US, Google Finance (NYSE)
    /// - funds: Yahoo Finance Japan, SBI, Rakuten, Minkabu, Morningstar
    pub fn new_with_defaults(timeout: Duration) -> Self {
        let mut registry = Self::new();
        for profile in sources::default_profiles() {
            let id = profile.id().to_string();
            match HtmlQuoteSource::new(profile, timeout) {
                Ok(source) => registry.register(Box::new(source)),
                // Only a broken TLS backend makes client construction fail.
                Err(e) => warn!("Skipping quote source {id}: {e}"),
            }
        }
        registry
    }

    /// Register a new source. It goes after every source already registered.
    pub fn register(&mut self, source: Box<dyn QuoteSource>) {
        self.sources.push(source);
    }

    /// All sources for a classification, in priority order.
    pub fn sources_for(&self, class: Classification) -> Vec<&dyn QuoteSource> {
        self.sources
            .iter()
            .filter(|s| s.supports(class))
            .map(|s| s.as_ref())
            .collect()
    }

    pub fn source_ids_for(&self, class: Classification) -> Vec<String> {
        self.sources_for(class)
            .iter()
            .map(|s| s.id().to_string())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for QuoteSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
