//! Price extraction from fetched documents.
//!
//! A source provider owns a ranked list of [`ExtractionStrategy`] objects.
//! Each strategy knows one place where a price tends to live on a page and
//! yields candidates from it; the chain accepts the first candidate that
//! passes [`PriceValidator`]. Adding, removing or reordering strategies never
//! touches provider or resolver code.

pub mod strategies;
pub mod validation;

use std::str::FromStr;
use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};

pub use validation::{PriceCheck, PriceValidator, Rejection};

/// First number in a text run: optional sign, digits with thousands commas, optional fraction.
static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?[0-9][0-9,]*(?:\.[0-9]+)?").expect("static regex"));

/// A fetched page, parsed once and shared by every strategy of a provider.
///
/// Not `Send`: build it, run the strategies and drop it without crossing an
/// `.await`.
pub struct Document {
    raw: String,
    html: Html,
}

impl Document {
    pub fn parse(body: &str) -> Self {
        Self {
            raw: body.to_string(),
            html: Html::parse_document(body),
        }
    }

    /// The body exactly as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// All text nodes of the page joined by single spaces.
    pub fn text(&self) -> String {
        normalize_whitespace(&self.html.root_element().text().collect::<Vec<_>>().join(" "))
    }

    /// Elements matching a CSS selector. An unparsable selector matches nothing.
    pub fn select(&self, css: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(css) {
            Ok(selector) => self.html.select(&selector).collect(),
            Err(e) => {
                debug!("Ignoring invalid selector '{css}': {e}");
                Vec::new()
            }
        }
    }
}

/// One value found on a page, with the text it was read from.
///
/// The text is kept so validation can spot unit markers next to the number.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub value: Decimal,
    pub text: String,
}

impl Candidate {
    /// Parse the first number in `text`; `None` when there is none.
    pub fn from_text(text: &str) -> Option<Self> {
        let value = parse_number(text)?;
        Some(Self {
            value,
            text: text.trim().to_string(),
        })
    }
}

/// One place/pattern where a price may be found.
pub trait ExtractionStrategy: Send + Sync {
    /// Short label for logs (e.g. "selector-text").
    fn name(&self) -> &str;

    /// Every value this strategy can see, best first.
    fn candidates(&self, doc: &Document) -> Vec<Candidate>;

    /// First candidate that passes validation, if any.
    fn attempt(&self, doc: &Document, check: &PriceCheck<'_>) -> Option<Decimal> {
        self.candidates(doc)
            .into_iter()
            .find_map(|candidate| check.accept(self.name(), &candidate))
    }
}

/// Run strategies in order; the first validated value wins.
pub fn extract_price(
    strategies: &[Box<dyn ExtractionStrategy>],
    doc: &Document,
    check: &PriceCheck<'_>,
) -> Option<Decimal> {
    for strategy in strategies {
        if let Some(price) = strategy.attempt(doc, check) {
            debug!(
                "Strategy '{}' extracted {price} for {}",
                strategy.name(),
                check.code()
            );
            return Some(price);
        }
    }
    None
}

/// Parse the first number in a text run, ignoring thousands separators.
///
/// `"$1,234.50"` → `1234.50`, `"9,970円"` → `9970`, `"n/a"` → `None`.
pub fn parse_number(text: &str) -> Option<Decimal> {
    let m = NUMBER.find(text)?;
    let cleaned: String = m.as_str().chars().filter(|c| *c != ',').collect();
    Decimal::from_str(cleaned.trim_start_matches('+')).ok()
}

/// Text content of an element with whitespace collapsed.
pub fn element_text(element: &ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
