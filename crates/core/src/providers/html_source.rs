use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use regex::Regex;
use reqwest::Client;

use crate::errors::CoreError;
use crate::extraction::strategies::TextReader;
use crate::extraction::{extract_price, Document, ExtractionStrategy, PriceValidator};
use crate::models::holding::{Classification, InstrumentType, Market};
use crate::models::quote::QuoteResult;

use super::traits::QuoteSource;

/// Browser-like user agent sent to sources that reject bare clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Fund pages title themselves "<name>の基準価額・投資信託情報".
static NAME_BOILERPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"の基準価額\s*・*\s*投資信託情報$").expect("static regex")
});

/// Reads one piece of metadata from a page.
pub enum MetadataReader {
    Text(TextReader),
    /// Amount and percentage read separately, shown as "+1.23 (0.45%)".
    AmountAndPercent { amount: TextReader, percent: TextReader },
}

impl MetadataReader {
    pub fn read(&self, doc: &Document) -> Option<String> {
        match self {
            MetadataReader::Text(reader) => reader.read(doc),
            MetadataReader::AmountAndPercent { amount, percent } => {
                let amount = crate::extraction::parse_number(&amount.read(doc)?)?;
                let percent = crate::extraction::parse_number(&percent.read(doc)?)?;
                let sign = if amount.is_sign_negative() { "" } else { "+" };
                Some(format!("{sign}{:.2} ({:.2}%)", amount, percent))
            }
        }
    }
}

impl From<TextReader> for MetadataReader {
    fn from(reader: TextReader) -> Self {
        MetadataReader::Text(reader)
    }
}

/// Everything that distinguishes one scraped source from another.
pub struct SourceProfile {
    id: String,
    url_template: String,
    user_agent: String,
    timeout: Option<Duration>,
    classes: Vec<Classification>,
    price_strategies: Vec<Box<dyn ExtractionStrategy>>,
    name_readers: Vec<MetadataReader>,
    change_readers: Vec<MetadataReader>,
}

impl SourceProfile {
    /// `url_template` must contain `{code}`.
    pub fn new(id: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url_template: url_template.into(),
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout: None,
            classes: Vec::new(),
            price_strategies: Vec::new(),
            name_readers: Vec::new(),
            change_readers: Vec::new(),
        }
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Override the registry-wide timeout for this source.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn serves(mut self, classes: &[Classification]) -> Self {
        self.classes.extend_from_slice(classes);
        self
    }

    /// Append a price strategy; strategies run in the order they were added.
    pub fn price(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.price_strategies.push(Box::new(strategy));
        self
    }

    pub fn name(mut self, reader: impl Into<MetadataReader>) -> Self {
        self.name_readers.push(reader.into());
        self
    }

    pub fn change(mut self, reader: impl Into<MetadataReader>) -> Self {
        self.change_readers.push(reader.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url_for(&self, code: &str) -> String {
        self.url_template.replace("{code}", code.trim())
    }
}

/// A [`QuoteSource`] that downloads an HTML page and runs a [`SourceProfile`]
/// against it.
pub struct HtmlQuoteSource {
    profile: SourceProfile,
    client: Client,
    validator: PriceValidator,
}

impl HtmlQuoteSource {
    pub fn new(profile: SourceProfile, default_timeout: Duration) -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(profile.timeout.unwrap_or(default_timeout))
            .user_agent(profile.user_agent.clone())
            .build()?;
        Ok(Self {
            profile,
            client,
            validator: PriceValidator::default(),
        })
    }

    pub fn with_validator(mut self, validator: PriceValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    /// Run the profile against an already fetched body.
    pub fn extract_quote(&self, code: &str, class: Classification, url: &str, body: &str) -> QuoteResult {
        let doc = Document::parse(body);
        let check = self.validator.check_for(code, class);

        let price = extract_price(&self.profile.price_strategies, &doc, &check);
        let display_name = first_reading(&self.profile.name_readers, &doc).map(|name| clean_display_name(&name));
        let change_text = first_reading(&self.profile.change_readers, &doc);

        if price.is_none() {
            debug!("{}: no valid price for {code} at {url}", self.profile.id);
        }

        QuoteResult {
            price,
            change_text,
            display_name: display_name.filter(|n| !n.is_empty()),
            source_id: self.profile.id.clone(),
            fetched_url: url.to_string(),
        }
    }

    async fn get_body(&self, url: &str) -> Result<String, CoreError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CoreError::Api {
                provider: self.profile.id.clone(),
                message: format!("HTTP {status}"),
            });
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl QuoteSource for HtmlQuoteSource {
    fn id(&self) -> &str {
        &self.profile.id
    }

    fn supports(&self, class: Classification) -> bool {
        self.profile.classes.contains(&class)
    }

    async fn fetch(&self, code: &str, market: Market, instrument: InstrumentType) -> QuoteResult {
        let url = self.profile.url_for(code);
        debug!("{}: fetching {url}", self.profile.id);

        let body = match self.get_body(&url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("{}: request for {code} failed: {e}", self.profile.id);
                return QuoteResult::absent(&self.profile.id, url);
            }
        };

        self.extract_quote(code, Classification::new(market, instrument), &url, &body)
    }
}

/// Strip the fund-page title boilerplate from a display name.
pub fn clean_display_name(name: &str) -> String {
    NAME_BOILERPLATE.replace(name.trim(), "").trim().to_string()
}

fn first_reading(readers: &[MetadataReader], doc: &Document) -> Option<String> {
    readers.iter().find_map(|reader| reader.read(doc))
}
