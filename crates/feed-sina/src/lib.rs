#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/feed/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Sina Finance realtime quote provider.
//!
//! # Example
//!
//! ```no_run
//! use feed_sina::SinaProvider;
//! use feed_core::{DataProvider, Request, Symbol};
//!
//! # async fn example() -> feed_core::Result<()> {
//! let provider = SinaProvider::new();
//! let symbols = vec![Symbol::parse("600000.SH")?, Symbol::parse("000001.SZ")?];
//! let record = provider.execute(&Request::BatchQuote { symbols }).await?;
//! println!("{record:?}");
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use feed_core::{
    DataError, DataProvider, Operation, Quote, Record, Request, Result, Symbol, SymbolScheme,
    time::local_to_utc,
};
use reqwest::{Client, header::REFERER};
use tracing::{debug, warn};

/// Registry name of this provider.
pub const PROVIDER_NAME: &str = "sina";

const QUOTE_URL: &str = "https://hq.sinajs.cn/list=";
const REFERER_URL: &str = "https://finance.sina.com.cn/";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimum field count of an A-share quote line (through date and time).
const MIN_FIELDS: usize = 32;

const CAPABILITIES: &[Operation] = &[
    Operation::Quote,
    Operation::BatchQuote,
    Operation::MarketIndex,
];

/// Sina Finance quote provider.
#[derive(Debug, Clone)]
pub struct SinaProvider {
    client: Client,
}

impl Default for SinaProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SinaProvider {
    /// Create a new Sina provider.
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self::with_client(client)
    }

    /// Create a new Sina provider with a custom HTTP client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, symbols: &[Symbol]) -> Result<Vec<Quote>> {
        let list = symbols
            .iter()
            .map(|s| SymbolScheme::LowerPrefix.encode(s))
            .collect::<Vec<_>>()
            .join(",");
        debug!(list, "Sina request");

        let response = self
            .client
            .get(format!("{QUOTE_URL}{list}"))
            .header(REFERER, REFERER_URL)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DataError::from_status(PROVIDER_NAME, status.as_u16(), text));
        }

        // Content-Type carries charset=GBK; reqwest decodes it.
        let body = response.text().await.map_err(transport_error)?;
        parse_body(&body)
    }
}

#[async_trait]
impl DataProvider for SinaProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn description(&self) -> &str {
        "Sina Finance realtime quotes and indices with native batching"
    }

    fn capabilities(&self) -> &[Operation] {
        CAPABILITIES
    }

    fn symbol_scheme(&self) -> SymbolScheme {
        SymbolScheme::LowerPrefix
    }

    async fn execute(&self, request: &Request) -> Result<Option<Record>> {
        match request {
            Request::Quote { symbol } => {
                let quotes = self.fetch(std::slice::from_ref(symbol)).await?;
                Ok(quotes
                    .into_iter()
                    .find(|q| q.symbol == *symbol)
                    .map(Record::Quote))
            }
            Request::BatchQuote { symbols } => {
                let quotes = self.fetch(symbols).await?;
                Ok((!quotes.is_empty()).then_some(Record::Quotes(quotes)))
            }
            // Index lines share the stock layout, so one batch call covers them.
            Request::MarketIndex => {
                let quotes = self.fetch(&Symbol::main_indices()).await?;
                Ok((!quotes.is_empty()).then_some(Record::Indices(quotes)))
            }
            other => Err(DataError::UnsupportedOperation(other.operation())),
        }
    }
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

/// Parses every `var hq_str_<code>="...";` line of a response.
fn parse_body(body: &str) -> Result<Vec<Quote>> {
    let mut quotes = Vec::new();
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some((code, payload)) = split_assignment(line) else {
            return Err(DataError::malformed(
                PROVIDER_NAME,
                format!("unexpected line: {line}"),
            ));
        };
        if payload.is_empty() {
            debug!(code, "Empty quote payload");
            continue;
        }
        match parse_line(code, payload) {
            Some(quote) => quotes.push(quote),
            None => warn!(code, "Skipping unparseable quote line"),
        }
    }
    Ok(quotes)
}

/// Splits `var hq_str_sh600000="..."` into `("sh600000", "...")`.
fn split_assignment(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("var hq_str_")?;
    let (code, value) = rest.split_once('=')?;
    let value = value.trim().trim_end_matches(';');
    let value = value.strip_prefix('"')?.strip_suffix('"')?;
    Some((code.trim(), value))
}

fn parse_line(code: &str, payload: &str) -> Option<Quote> {
    let symbol = SymbolScheme::LowerPrefix.decode(code).ok()?;
    let fields: Vec<&str> = payload.split(',').collect();
    if fields.len() < MIN_FIELDS {
        return None;
    }
    let field = |i: usize| fields[i].trim().parse::<f64>().ok();

    let price = field(3)?;
    let quote = Quote {
        name: Some(fields[0].trim().to_string()).filter(|n| !n.is_empty()),
        open: field(1).filter(|v| *v > 0.0),
        prev_close: field(2),
        high: field(4).filter(|v| *v > 0.0),
        low: field(5).filter(|v| *v > 0.0),
        volume: field(8),
        amount: field(9),
        timestamp: NaiveDate::parse_from_str(fields[30].trim(), "%Y-%m-%d")
            .ok()
            .zip(NaiveTime::parse_from_str(fields[31].trim(), "%H:%M:%S").ok())
            .and_then(|(date, time)| local_to_utc(date.and_time(time))),
        ..Quote::new(symbol, price)
    };
    // Suspended or pre-open instruments report a zero price.
    quote.has_price().then_some(quote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn line(code: &str, name: &str, price: &str) -> String {
        let mut fields = vec![
            name, "7.280", "7.280", price, "7.350", "7.250", "7.300", "7.310", "34567800",
            "252000500.000",
        ];
        fields.extend(std::iter::repeat_n("0", 20));
        fields.extend(["2024-01-05", "15:00:00", "00"]);
        format!("var hq_str_{code}=\"{}\";", fields.join(","))
    }

    #[test]
    fn test_parse_batch_body() {
        let body = format!(
            "{}\n{}\nvar hq_str_sh688999=\"\";\n",
            line("sh600000", "浦发银行", "7.310"),
            line("sz000001", "平安银行", "9.500"),
        );
        let quotes = parse_body(&body).unwrap();

        assert_eq!(quotes.len(), 2);
        let pufa = &quotes[0];
        assert_eq!(pufa.symbol.to_string(), "600000.SH");
        assert_eq!(pufa.name.as_deref(), Some("浦发银行"));
        assert_eq!(pufa.price, 7.31);
        assert_eq!(pufa.prev_close, Some(7.28));
        assert_eq!(pufa.volume, Some(34_567_800.0));
        assert_eq!(pufa.timestamp.unwrap().hour(), 7);
        assert_eq!(quotes[1].symbol.to_string(), "000001.SZ");
    }

    #[test]
    fn test_parse_index_lines() {
        let body = format!(
            "{}\n{}\n{}\n",
            line("sh000001", "上证指数", "3050.216"),
            line("sz399001", "深证成指", "9420.551"),
            line("sz399006", "创业板指", "1843.907"),
        );
        let quotes = parse_body(&body).unwrap();
        let symbols: Vec<String> = quotes.iter().map(|q| q.symbol.to_string()).collect();

        assert_eq!(symbols, ["000001.SH", "399001.SZ", "399006.SZ"]);
        assert_eq!(quotes[2].name.as_deref(), Some("创业板指"));
        assert_eq!(quotes[0].price, 3050.216);
    }

    #[test]
    fn test_zero_price_is_skipped() {
        let body = line("sh600000", "浦发银行", "0.000");
        assert!(parse_body(&body).unwrap().is_empty());
    }

    #[test]
    fn test_short_line_is_skipped() {
        let body = r#"var hq_str_sh600000="浦发银行,7.28,7.28,7.31";"#;
        assert!(parse_body(body).unwrap().is_empty());
    }

    #[test]
    fn test_unexpected_body_is_malformed() {
        let err = parse_body("Forbidden").unwrap_err();
        assert!(matches!(err, DataError::MalformedResponse { .. }));
    }

    #[test]
    fn test_provider_metadata() {
        let provider = SinaProvider::new();
        assert_eq!(provider.name(), "sina");
        assert!(provider.supports(Operation::BatchQuote));
        assert!(provider.supports(Operation::MarketIndex));
        assert!(!provider.supports(Operation::HistoricalBars));
        assert_eq!(provider.symbol_scheme(), SymbolScheme::LowerPrefix);
    }
}
