#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/feed/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! East Money data provider.
//!
//! # Example
//!
//! ```no_run
//! use feed_eastmoney::EastMoneyProvider;
//! use feed_core::{DataProvider, Request};
//!
//! # async fn example() -> feed_core::Result<()> {
//! let provider = EastMoneyProvider::new();
//! let record = provider.execute(&Request::IndustryList).await?;
//! println!("{record:?}");
//! # Ok(())
//! # }
//! ```

mod wire;

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use feed_core::{
    DataError, DataFrequency, DataProvider, Industry, Operation, Quote, Record, Request, Result,
    Symbol, SymbolScheme, time::compact_date,
};
use reqwest::{Client, header::REFERER};
use serde_json::Value;
use tracing::{debug, warn};

use crate::wire::{
    parse_board_members, parse_board_valuations, parse_boards, parse_klines, parse_quote,
    strip_jsonp,
};

/// Registry name of this provider.
pub const PROVIDER_NAME: &str = "eastmoney";

const QUOTE_URL: &str = "https://push2.eastmoney.com/api/qt/stock/get";
const LIST_URL: &str = "https://push2.eastmoney.com/api/qt/clist/get";
const KLINE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";

const QUOTE_FIELDS: &str = "f43,f44,f45,f46,f47,f48,f57,f58,f60,f86,f116,f162,f167";

const BOARD_VALUATION_FIELDS: &str = "f12,f14,f9,f20,f23";

/// Industry boards.
const INDUSTRY_BOARDS: &str = "m:90+t:2";

/// Largest page the listing endpoint honours.
const PAGE_SIZE: u32 = 500;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
const REFERER_URL: &str = "https://quote.eastmoney.com/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const CAPABILITIES: &[Operation] = &[
    Operation::Quote,
    Operation::HistoricalBars,
    Operation::IndustryList,
    Operation::IndustryStocks,
    Operation::IndustryValuations,
    Operation::MarketIndex,
];

const SUPPORTED_FREQUENCIES: &[DataFrequency] = &[
    DataFrequency::Minute,
    DataFrequency::FiveMinute,
    DataFrequency::FifteenMinute,
    DataFrequency::ThirtyMinute,
    DataFrequency::Hourly,
    DataFrequency::Daily,
    DataFrequency::Weekly,
    DataFrequency::Monthly,
];

/// East Money data provider.
#[derive(Debug, Clone)]
pub struct EastMoneyProvider {
    client: Client,
}

impl Default for EastMoneyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EastMoneyProvider {
    /// Create a new East Money provider with browser-style headers.
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self::with_client(client)
    }

    /// Create a new East Money provider with a custom HTTP client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        debug!(url, "East Money request");
        let response = self
            .client
            .get(url)
            .header(REFERER, REFERER_URL)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DataError::from_status(PROVIDER_NAME, status.as_u16(), text));
        }

        let text = response.text().await.map_err(transport_error)?;
        serde_json::from_str(strip_jsonp(&text))
            .map_err(|e| DataError::malformed(PROVIDER_NAME, e.to_string()))
    }

    async fn quote(&self, symbol: &Symbol) -> Result<Option<Quote>> {
        let query = [
            ("secid", SymbolScheme::MarketId.encode(symbol)),
            ("fields", QUOTE_FIELDS.to_string()),
            ("fltt", "2".to_string()),
            ("invt", "2".to_string()),
        ];
        let body = self.get_json(QUOTE_URL, &query).await?;
        Ok(parse_quote(&body, symbol))
    }

    /// One quote call per index; an index that fails is left out.
    async fn indices(&self) -> Result<Option<Record>> {
        let mut quotes = Vec::new();
        let mut last_error = None;
        for symbol in Symbol::main_indices() {
            match self.quote(&symbol).await {
                Ok(Some(quote)) => quotes.push(quote),
                Ok(None) => {}
                Err(err) => {
                    warn!(%symbol, error = %err, "East Money index quote failed");
                    last_error = Some(err);
                }
            }
        }
        match last_error {
            Some(err) if quotes.is_empty() => Err(err),
            _ => Ok((!quotes.is_empty()).then_some(Record::Indices(quotes))),
        }
    }

    async fn boards(&self) -> Result<Vec<Industry>> {
        let body = self
            .get_json(LIST_URL, &list_query(INDUSTRY_BOARDS, "f12,f14"))
            .await?;
        Ok(parse_boards(&body))
    }

    /// Board code for an industry given by code (`BK0475`) or by name.
    async fn board_code(&self, industry: &str) -> Result<Option<String>> {
        let industry = industry.trim();
        if is_board_code(industry) {
            return Ok(Some(industry.to_ascii_uppercase()));
        }
        let boards = self.boards().await?;
        let code = boards
            .into_iter()
            .find(|b| b.name == industry)
            .and_then(|b| b.code);
        if code.is_none() {
            warn!(industry, "No East Money board with this name");
        }
        Ok(code)
    }

    async fn bars(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
        frequency: DataFrequency,
    ) -> Result<Option<Record>> {
        let klt = kline_type(frequency).ok_or_else(|| {
            DataError::NotSupported(format!("East Money does not serve {frequency} bars"))
        })?;
        let query = [
            ("secid", SymbolScheme::MarketId.encode(symbol)),
            ("fields1", "f1,f2,f3,f4,f5,f6".to_string()),
            ("fields2", "f51,f52,f53,f54,f55,f56,f57".to_string()),
            ("klt", klt.to_string()),
            ("fqt", "1".to_string()),
            ("beg", compact_date(start)),
            ("end", compact_date(end)),
        ];
        let body = self.get_json(KLINE_URL, &query).await?;
        let bars = parse_klines(&body, frequency.is_intraday())?;
        Ok((!bars.is_empty()).then_some(Record::Bars(bars)))
    }
}

#[async_trait]
impl DataProvider for EastMoneyProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn description(&self) -> &str {
        "East Money quotes, industry boards, valuations and kline history"
    }

    fn capabilities(&self) -> &[Operation] {
        CAPABILITIES
    }

    fn supported_frequencies(&self) -> &[DataFrequency] {
        SUPPORTED_FREQUENCIES
    }

    fn symbol_scheme(&self) -> SymbolScheme {
        SymbolScheme::MarketId
    }

    async fn execute(&self, request: &Request) -> Result<Option<Record>> {
        match request {
            Request::Quote { symbol } => Ok(self.quote(symbol).await?.map(Record::Quote)),
            Request::HistoricalBars {
                symbol,
                start,
                end,
                frequency,
            } => self.bars(symbol, *start, *end, *frequency).await,
            Request::IndustryList => {
                let boards = self.boards().await?;
                Ok((!boards.is_empty()).then_some(Record::Industries(boards)))
            }
            Request::IndustryStocks { industry } => {
                let Some(code) = self.board_code(industry).await? else {
                    return Ok(None);
                };
                let fs = format!("b:{code}");
                let body = self.get_json(LIST_URL, &list_query(&fs, "f12,f13,f14")).await?;
                let members = parse_board_members(&body);
                Ok((!members.is_empty()).then_some(Record::Constituents(members)))
            }
            Request::IndustryValuations => {
                let body = self
                    .get_json(LIST_URL, &list_query(INDUSTRY_BOARDS, BOARD_VALUATION_FIELDS))
                    .await?;
                let boards = parse_board_valuations(&body);
                Ok((!boards.is_empty()).then_some(Record::Valuations(boards)))
            }
            Request::MarketIndex => self.indices().await,
            other => Err(DataError::UnsupportedOperation(other.operation())),
        }
    }
}

fn list_query(fs: &str, fields: &str) -> [(&'static str, String); 7] {
    [
        ("pn", "1".to_string()),
        ("pz", PAGE_SIZE.to_string()),
        ("po", "1".to_string()),
        ("np", "1".to_string()),
        ("fltt", "2".to_string()),
        ("fs", fs.to_string()),
        ("fields", fields.to_string()),
    ]
}

const fn kline_type(frequency: DataFrequency) -> Option<u16> {
    match frequency {
        DataFrequency::Minute => Some(1),
        DataFrequency::FiveMinute => Some(5),
        DataFrequency::FifteenMinute => Some(15),
        DataFrequency::ThirtyMinute => Some(30),
        DataFrequency::Hourly => Some(60),
        DataFrequency::Daily => Some(101),
        DataFrequency::Weekly => Some(102),
        DataFrequency::Monthly => Some(103),
    }
}

fn is_board_code(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 6
        && bytes[..2].eq_ignore_ascii_case(b"BK")
        && bytes[2..].iter().all(u8::is_ascii_digit)
}

fn transport_error(e: reqwest::Error) -> DataError {
    if e.is_timeout() {
        DataError::Timeout {
            provider: PROVIDER_NAME.to_string(),
            after: REQUEST_TIMEOUT,
        }
    } else {
        DataError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_codes() {
        assert!(is_board_code("BK0475"));
        assert!(is_board_code("bk0475"));
        assert!(!is_board_code("银行"));
        assert!(!is_board_code("BK04"));
    }

    #[test]
    fn test_every_frequency_has_a_kline_type() {
        for frequency in SUPPORTED_FREQUENCIES {
            assert!(kline_type(*frequency).is_some());
        }
        assert_eq!(kline_type(DataFrequency::Daily), Some(101));
    }

    #[tokio::test]
    async fn test_unsupported_operation() {
        let provider = EastMoneyProvider::new();
        let symbol = Symbol::parse("600000.SH").unwrap();
        let err = provider
            .execute(&Request::CompanyInfo { symbol })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DataError::UnsupportedOperation(Operation::CompanyInfo)
        ));
    }

    #[test]
    fn test_provider_metadata() {
        let provider = EastMoneyProvider::new();
        assert_eq!(provider.name(), "eastmoney");
        assert!(provider.supports(Operation::IndustryStocks));
        assert!(provider.supports(Operation::IndustryValuations));
        assert!(provider.supports(Operation::MarketIndex));
        assert!(!provider.supports(Operation::Financials));
    }
}
