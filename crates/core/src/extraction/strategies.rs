//! The concrete extraction strategies.
//!
//! Each one is a small, stateless description of where to look. Providers
//! combine them into ranked lists (see `providers::sources`).

use regex::Regex;
use scraper::ElementRef;

use super::{element_text, Candidate, Document, ExtractionStrategy};

/// Elements that commonly hold a short label such as "基準価額".
const LABEL_ELEMENTS: &str = "span, th, td, dt, dd, p, div, h2, h3";

/// Labels are short; anything much longer is a container, not the label itself.
const MAX_LABEL_ELEMENT_CHARS: usize = 24;

/// Text of the `nth` element matching a CSS selector.
pub struct SelectorText {
    css: String,
    nth: usize,
}

impl SelectorText {
    pub fn new(css: impl Into<String>) -> Self {
        Self::nth(css, 0)
    }

    pub fn nth(css: impl Into<String>, nth: usize) -> Self {
        Self {
            css: css.into(),
            nth,
        }
    }
}

impl ExtractionStrategy for SelectorText {
    fn name(&self) -> &str {
        "selector-text"
    }

    fn candidates(&self, doc: &Document) -> Vec<Candidate> {
        doc.select(&self.css)
            .get(self.nth)
            .and_then(|el| Candidate::from_text(&element_text(el)))
            .into_iter()
            .collect()
    }
}

/// An attribute of the first element matching a CSS selector
/// (e.g. `data-value` of a streaming price widget).
pub struct SelectorAttr {
    css: String,
    attr: String,
}

impl SelectorAttr {
    pub fn new(css: impl Into<String>, attr: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            attr: attr.into(),
        }
    }
}

impl ExtractionStrategy for SelectorAttr {
    fn name(&self) -> &str {
        "selector-attr"
    }

    fn candidates(&self, doc: &Document) -> Vec<Candidate> {
        doc.select(&self.css)
            .first()
            .and_then(|el| el.value().attr(&self.attr))
            .and_then(Candidate::from_text)
            .into_iter()
            .collect()
    }
}

/// The number that follows a label in the page text, e.g. "基準価額 12,345円".
pub struct LabeledText {
    pattern: Option<Regex>,
}

impl LabeledText {
    pub fn new(label: &str) -> Self {
        // Capture a few trailing characters so unit markers stay visible to validation.
        let pattern = format!(
            r"{}[^0-9]{{0,20}}([0-9][0-9,]*(?:\.[0-9]+)?\S{{0,3}})",
            regex::escape(label)
        );
        Self {
            pattern: Regex::new(&pattern).ok(),
        }
    }
}

impl ExtractionStrategy for LabeledText {
    fn name(&self) -> &str {
        "labeled-text"
    }

    fn candidates(&self, doc: &Document) -> Vec<Candidate> {
        let Some(pattern) = &self.pattern else {
            return Vec::new();
        };
        let text = doc.text();
        pattern
            .captures_iter(&text)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| Candidate::from_text(m.as_str()))
            .collect()
    }
}

/// The element right after a label element, or after the label's parent.
///
/// Handles layouts like `<div><span>基準価額</span></div><div>12,345円</div>`.
pub struct LabelSibling {
    label: String,
}

impl LabelSibling {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl ExtractionStrategy for LabelSibling {
    fn name(&self) -> &str {
        "label-sibling"
    }

    fn candidates(&self, doc: &Document) -> Vec<Candidate> {
        let mut out = Vec::new();
        for label in doc.select(LABEL_ELEMENTS) {
            if !is_label(&label, &self.label) {
                continue;
            }
            let parent = label.parent().and_then(ElementRef::wrap);
            let owners = std::iter::once(label).chain(parent);
            for owner in owners {
                if let Some(sibling) = next_element(&owner) {
                    if let Some(candidate) = Candidate::from_text(&element_text(&sibling)) {
                        out.push(candidate);
                    }
                }
            }
        }
        out
    }
}

/// The table cell after a label cell: `<tr><th>基準価額</th><td>12,345円</td></tr>`.
pub struct TableCellAfterLabel {
    label: String,
}

impl TableCellAfterLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl ExtractionStrategy for TableCellAfterLabel {
    fn name(&self) -> &str {
        "table-cell-after-label"
    }

    fn candidates(&self, doc: &Document) -> Vec<Candidate> {
        doc.select("th, td")
            .into_iter()
            .filter(|cell| is_label(cell, &self.label))
            .filter_map(|cell| next_element(&cell))
            .filter(|next| matches!(next.value().name(), "td" | "th"))
            .filter_map(|next| Candidate::from_text(&element_text(&next)))
            .collect()
    }
}

/// Spans whose whole text is a long digits-and-commas number (e.g. "12,345").
/// Prices are usually rendered as the largest standalone figure.
pub struct NumericSpan {
    min_len: usize,
}

impl NumericSpan {
    pub fn new(min_len: usize) -> Self {
        Self { min_len }
    }
}

impl ExtractionStrategy for NumericSpan {
    fn name(&self) -> &str {
        "numeric-span"
    }

    fn candidates(&self, doc: &Document) -> Vec<Candidate> {
        doc.select("span")
            .into_iter()
            .map(|span| element_text(&span))
            .filter(|text| {
                text.len() >= self.min_len
                    && text.chars().all(|c| c.is_ascii_digit() || c == ',')
            })
            .filter_map(|text| Candidate::from_text(&text))
            .collect()
    }
}

/// A regex scan over the raw body; the first capture group is the number.
pub struct PricePattern {
    name: &'static str,
    pattern: Regex,
}

/// Characters kept after a match so validation can see suffixes like "百万円".
const TRAILING_CONTEXT_CHARS: usize = 4;

impl PricePattern {
    /// Amounts written as "12,345円".
    pub fn yen_amount() -> Self {
        Self::from_static("yen-amount", r"([0-9]{1,3}(?:,[0-9]{3})+(?:\.[0-9]+)?)円")
    }

    /// Amounts written as "$123.45".
    pub fn dollar_amount() -> Self {
        Self::from_static("dollar-amount", r"\$([0-9][0-9,]*(?:\.[0-9]+)?)")
    }

    /// Bare thousands-grouped figures such as "9,970".
    pub fn grouped_thousands() -> Self {
        Self::from_static("grouped-thousands", r"\b([0-9]{1,3},[0-9]{3})\b")
    }

    fn from_static(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("static regex"),
        }
    }
}

impl ExtractionStrategy for PricePattern {
    fn name(&self) -> &str {
        self.name
    }

    fn candidates(&self, doc: &Document) -> Vec<Candidate> {
        let raw = doc.raw();
        self.pattern
            .captures_iter(raw)
            .filter_map(|caps| {
                let number = caps.get(1)?;
                let whole = caps.get(0)?;
                let trailing: String = raw[whole.end()..]
                    .chars()
                    .take(TRAILING_CONTEXT_CHARS)
                    .collect();
                let value = super::parse_number(number.as_str())?;
                Some(Candidate {
                    value,
                    text: format!("{}{trailing}", whole.as_str()),
                })
            })
            .collect()
    }
}

/// Reads a piece of text (name, day change…) from the page.
pub struct TextReader {
    css: String,
    attr: Option<String>,
    nth: usize,
}

impl TextReader {
    pub fn new(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            attr: None,
            nth: 0,
        }
    }

    pub fn nth(css: impl Into<String>, nth: usize) -> Self {
        Self {
            nth,
            ..Self::new(css)
        }
    }

    pub fn attr(css: impl Into<String>, attr: impl Into<String>) -> Self {
        Self {
            attr: Some(attr.into()),
            ..Self::new(css)
        }
    }

    /// Trimmed, non-empty text or attribute value.
    pub fn read(&self, doc: &Document) -> Option<String> {
        let elements = doc.select(&self.css);
        let element = elements.get(self.nth)?;
        let text = match &self.attr {
            Some(attr) => element.value().attr(attr)?.trim().to_string(),
            None => element_text(element),
        };
        (!text.is_empty()).then_some(text)
    }
}

fn is_label(element: &ElementRef<'_>, label: &str) -> bool {
    let text = element_text(element);
    text.contains(label) && text.chars().count() <= MAX_LABEL_ELEMENT_CHARS
}

fn next_element<'a>(element: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    element.next_siblings().find_map(ElementRef::wrap)
}
