use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::errors::CoreError;
use crate::extraction::strategies::SelectorText;
use crate::extraction::{extract_price, Document, ExtractionStrategy, PriceValidator};
use crate::models::holding::Classification;

use super::html_source::BROWSER_USER_AGENT;
use super::traits::FxSource;

/// Yahoo symbol of the USD/JPY pair.
pub const USD_JPY_SYMBOL: &str = "USDJPY=X";

/// Rate from the Yahoo Finance chart API, via `yahoo_finance_api`.
pub struct YahooChartFxSource {
    connector: yahoo_finance_api::YahooConnector,
    symbol: String,
}

impl YahooChartFxSource {
    pub fn new(symbol: impl Into<String>) -> Result<Self, CoreError> {
        let connector = yahoo_finance_api::YahooConnector::new().map_err(|e| CoreError::Api {
            provider: "yahoo_chart".into(),
            message: format!("Failed to create connector: {e}"),
        })?;
        Ok(Self {
            connector,
            symbol: symbol.into(),
        })
    }
}

#[async_trait]
impl FxSource for YahooChartFxSource {
    fn id(&self) -> &str {
        "yahoo_chart"
    }

    async fn fetch_rate(&self) -> Result<Decimal, CoreError> {
        let resp = self
            .connector
            .get_latest_quotes(&self.symbol, "1d")
            .await
            .map_err(|e| CoreError::Api {
                provider: "yahoo_chart".into(),
                message: format!("Failed to fetch {}: {e}", self.symbol),
            })?;

        let quote = resp.last_quote().map_err(|e| CoreError::Api {
            provider: "yahoo_chart".into(),
            message: format!("No quote data for {}: {e}", self.symbol),
        })?;

        Decimal::from_f64(quote.close)
            .map(|rate| rate.round_dp(4))
            .filter(|rate| *rate > Decimal::ZERO)
            .ok_or_else(|| CoreError::Api {
                provider: "yahoo_chart".into(),
                message: format!("Unusable rate {} for {}", quote.close, self.symbol),
            })
    }
}

/// Rate scraped from the Yahoo Finance Japan quote page.
pub struct PageFxSource {
    client: Client,
    url: String,
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    validator: PriceValidator,
}

impl PageFxSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            strategies: vec![
                Box::new(SelectorText::new("span._3rXWJKZF")),
                Box::new(SelectorText::new("span[data-test=\"qsp-price\"]")),
            ],
            validator: PriceValidator::default(),
        })
    }

    pub fn yahoo_japan(timeout: Duration) -> Result<Self, CoreError> {
        Self::new(format!("https://finance.yahoo.co.jp/quote/{USD_JPY_SYMBOL}"), timeout)
    }

    /// Extract the rate from an already fetched page.
    pub fn extract_rate(&self, body: &str) -> Option<Decimal> {
        let doc = Document::parse(body);
        let check = self
            .validator
            .check_for(USD_JPY_SYMBOL, Classification::FOREIGN_EQUITY);
        extract_price(&self.strategies, &doc, &check)
    }
}

#[async_trait]
impl FxSource for PageFxSource {
    fn id(&self) -> &str {
        "yahoo_jp_page"
    }

    async fn fetch_rate(&self) -> Result<Decimal, CoreError> {
        let resp = self.client.get(&self.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CoreError::Api {
                provider: self.id().to_string(),
                message: format!("HTTP {status}"),
            });
        }
        let body = resp.text().await?;
        self.extract_rate(&body).ok_or_else(|| CoreError::Api {
            provider: self.id().to_string(),
            message: "no rate found on page".into(),
        })
    }
}
