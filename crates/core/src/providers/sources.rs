//! Profiles of the shipped scraped sources.
//!
//! Selectors follow the markup each site served when the adapters were
//! written; when a site changes, only its profile here needs touching.

use crate::extraction::strategies::{
    LabelSibling, LabeledText, NumericSpan, PricePattern, SelectorAttr, SelectorText,
    TableCellAfterLabel, TextReader,
};
use crate::models::holding::Classification;

use super::html_source::{MetadataReader, SourceProfile};

const FUND_PRICE_LABEL: &str = "基準価額";
const DAY_CHANGE_LABEL: &str = "前日比";

/// Fund pages are served for both markets; a fund's market only decides
/// which side of the rebalance it counts on.
const FUNDS: &[Classification] = &[Classification::DOMESTIC_FUND, Classification::FOREIGN_FUND];

/// Every shipped profile in priority order. The registry keeps this order.
pub fn default_profiles() -> Vec<SourceProfile> {
    vec![
        yahoo_japan_equity(),
        google_finance("google_tyo", "TYO", Classification::DOMESTIC_EQUITY),
        google_finance("google_nasdaq", "NASDAQ", Classification::FOREIGN_EQUITY),
        yahoo_us(),
        google_finance("google_nyse", "NYSE", Classification::FOREIGN_EQUITY),
        yahoo_japan_fund(),
        sbi(),
        rakuten(),
        minkabu(),
        morningstar(),
    ]
}

pub fn yahoo_japan_equity() -> SourceProfile {
    SourceProfile::new("yahoo_jp", "https://finance.yahoo.co.jp/quote/{code}")
        .serves(&[Classification::DOMESTIC_EQUITY])
        .price(SelectorText::new("._3rXWJKZF"))
        .price(SelectorText::new("[data-test=\"qsp-price\"]"))
        .name(TextReader::new("h1"))
        .change(TextReader::nth("._3rXWJKZF", 1))
}

/// Yahoo Finance Japan fund page. Its markup moves often, so the chain is long
/// and ends with broad pattern scans guarded by validation.
pub fn yahoo_japan_fund() -> SourceProfile {
    SourceProfile::new("yahoo_jp_fund", "https://finance.yahoo.co.jp/quote/{code}")
        .serves(FUNDS)
        .price(SelectorText::new(
            "#contents > div > div:nth-child(2) > div:nth-child(2) > div:nth-child(3) > p:nth-child(1)",
        ))
        .price(SelectorText::new("h2 + div > span"))
        .price(LabelSibling::new(FUND_PRICE_LABEL))
        .price(TableCellAfterLabel::new(FUND_PRICE_LABEL))
        .price(NumericSpan::new(5))
        .price(PricePattern::yen_amount())
        .price(LabelSibling::new(DAY_CHANGE_LABEL))
        .price(SelectorText::new("span._3rXWJKZF"))
        .price(LabeledText::new(FUND_PRICE_LABEL))
        .price(PricePattern::grouped_thousands())
        .name(TextReader::new("h1"))
        .change(TextReader::new("span._3BGK5SVf"))
}

pub fn yahoo_us() -> SourceProfile {
    SourceProfile::new("yahoo_us", "https://finance.yahoo.com/quote/{code}")
        .user_agent("Mozilla/5.0")
        .serves(&[Classification::FOREIGN_EQUITY])
        .price(SelectorAttr::new(
            "fin-streamer[data-field=\"regularMarketPrice\"]",
            "data-value",
        ))
        .price(SelectorText::new("fin-streamer[data-field=\"regularMarketPrice\"]"))
        .price(SelectorText::new("[data-test=\"qsp-price\"]"))
        .name(TextReader::new("h1"))
        .change(MetadataReader::AmountAndPercent {
            amount: TextReader::attr("fin-streamer[data-field=\"regularMarketChange\"]", "data-value"),
            percent: TextReader::attr(
                "fin-streamer[data-field=\"regularMarketChangePercent\"]",
                "data-value",
            ),
        })
}

/// Google Finance for one exchange suffix (`TYO`, `NASDAQ`, `NYSE`).
pub fn google_finance(id: &str, exchange: &str, class: Classification) -> SourceProfile {
    SourceProfile::new(id, format!("https://www.google.com/finance/quote/{{code}}:{exchange}"))
        .serves(&[class])
        .price(SelectorText::new(".YMlKec.fxKbKc"))
        .name(TextReader::new(".zzDege"))
        .change(TextReader::new(".P6K39c"))
}

pub fn sbi() -> SourceProfile {
    SourceProfile::new(
        "sbi",
        "https://site0.sbisec.co.jp/marble/fund/detail/achievement.do?Param6={code}",
    )
    .serves(FUNDS)
    .price(SelectorText::new("td.alR.fwb"))
    .price(TableCellAfterLabel::new(FUND_PRICE_LABEL))
    .name(TextReader::new("span.fnt_14.fwb"))
    .change(TextReader::nth("td.alR", 1))
}

pub fn rakuten() -> SourceProfile {
    SourceProfile::new("rakuten", "https://www.rakuten-sec.co.jp/web/fund/detail/?ID={code}")
        .serves(FUNDS)
        .price(SelectorText::new(".fund-price-value"))
        .price(LabelSibling::new(FUND_PRICE_LABEL))
        .name(TextReader::new("h1.fund-detail-header-title"))
        .change(TextReader::new(".fund-price-change"))
}

pub fn minkabu() -> SourceProfile {
    SourceProfile::new("minkabu", "https://itf.minkabu.jp/fund/{code}")
        .serves(FUNDS)
        .price(SelectorText::new(".stock_price"))
        .price(LabeledText::new(FUND_PRICE_LABEL))
        .name(TextReader::new("h1.md_h1"))
        .change(TextReader::new(".stock_price_change"))
}

pub fn morningstar() -> SourceProfile {
    SourceProfile::new(
        "morningstar",
        "https://www.morningstar.co.jp/FundData/SnapShot.do?fnc={code}",
    )
    .serves(FUNDS)
    .price(SelectorText::new(
        "table.fund_data_table tr:nth-child(1) td:nth-child(2)",
    ))
    .price(TableCellAfterLabel::new(FUND_PRICE_LABEL))
    .name(TextReader::new(".page_title h1"))
    .change(TextReader::new(
        "table.fund_data_table tr:nth-child(2) td:nth-child(2)",
    ))
}
