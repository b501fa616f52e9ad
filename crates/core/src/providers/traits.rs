use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::errors::CoreError;
use crate::models::holding::{Classification, InstrumentType, Market};
use crate::models::quote::QuoteResult;

/// One external quote source (a web page, an API…).
///
/// Each adapter owns its request shape, headers and timeout. `fetch` never
/// fails: transport errors, non-2xx responses and pages without a usable
/// number all come back as a [`QuoteResult`] with no price, so the resolver
/// can simply move on to the next source.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Stable identifier reported as `sourceId` (e.g. "yahoo_jp").
    fn id(&self) -> &str;

    /// Whether this source can quote the given classification.
    fn supports(&self, class: Classification) -> bool;

    /// Look up one code. `market` is already normalized by the resolver.
    async fn fetch(&self, code: &str, market: Market, instrument: InstrumentType) -> QuoteResult;
}

/// A source for the single foreign → reporting currency rate.
#[async_trait]
pub trait FxSource: Send + Sync {
    fn id(&self) -> &str;

    /// Latest rate. Errors are logged by the caller, which keeps the previous rate.
    async fn fetch_rate(&self) -> Result<Decimal, CoreError>;
}
