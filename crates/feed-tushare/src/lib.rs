#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/feed/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Tushare Pro data provider.
//!
//! Implements [`DataProvider`] for every canonical operation:
//!
//! - Quotes and batch quotes from the latest `daily` row
//! - Daily, weekly and monthly bars
//! - Industry list and constituents from `stock_basic`
//! - Company basic information
//! - Quarterly financials merged from `income` and `balancesheet`
//! - Industry valuations averaged from `daily_basic` per `stock_basic` industry
//!
//! # Example
//!
//! ```no_run
//! use feed_tushare::TushareProvider;
//! use feed_core::{DataProvider, Request, Symbol};
//!
//! # async fn example() -> feed_core::Result<()> {
//! let provider = TushareProvider::new("your-token");
//! let symbol = Symbol::parse("600000.SH")?;
//! let record = provider.execute(&Request::Quote { symbol }).await?;
//! println!("{record:?}");
//! # Ok(())
//! # }
//! ```

mod table;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use feed_core::{
    CompanyInfo, DataError, DataFrequency, DataProvider, FinancialStatement, Industry,
    IndustryMember, OhlcvBar, Operation, Quote, Record, Request, Result, Symbol, SymbolScheme,
    time::{compact_date, market_today, session_close},
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::table::{Row, Table};

/// Registry name of this provider.
pub const PROVIDER_NAME: &str = "tushare";

/// Default Tushare Pro endpoint.
pub const TUSHARE_BASE_URL: &str = "http://api.tushare.pro";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Calendar days scanned for the latest trading day when building quotes.
const QUOTE_LOOKBACK_DAYS: i64 = 10;

/// Per-minute call quota exceeded.
const RATE_LIMIT_CODE: i64 = 40203;

/// Token missing, invalid or lacking permission for the API.
const TOKEN_ERROR_CODES: &[i64] = &[40001, 40101];

/// Tushare reports volume in lots of 100 shares.
const SHARES_PER_LOT: f64 = 100.0;

/// Tushare reports amounts in thousands of CNY.
const AMOUNT_UNIT: f64 = 1000.0;

/// `daily_basic` reports market value in tens of thousands of CNY.
const MARKET_VALUE_UNIT: f64 = 10_000.0;

const CAPABILITIES: &[Operation] = &[
    Operation::Quote,
    Operation::BatchQuote,
    Operation::HistoricalBars,
    Operation::IndustryList,
    Operation::IndustryStocks,
    Operation::CompanyInfo,
    Operation::Financials,
    Operation::IndustryValuations,
];

const SUPPORTED_FREQUENCIES: &[DataFrequency] = &[
    DataFrequency::Daily,
    DataFrequency::Weekly,
    DataFrequency::Monthly,
];

const DAILY_FIELDS: &str = "ts_code,trade_date,open,high,low,close,pre_close,vol,amount";
const BASIC_FIELDS: &str = "ts_code,name,industry,area,market,list_date";
const INCOME_FIELDS: &str = "ts_code,end_date,total_revenue,operate_profit,n_income_attr_p,basic_eps";
const BALANCE_FIELDS: &str = "ts_code,end_date,total_assets,total_liab,total_hldr_eqy_exc_min_int";
const VALUATION_FIELDS: &str = "ts_code,trade_date,pe,pe_ttm,pb,total_mv";

/// Tushare Pro data provider.
#[derive(Clone)]
pub struct TushareProvider {
    client: Client,
    token: String,
    base_url: String,
}

impl fmt::Debug for TushareProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TushareProvider")
            .field("token", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl TushareProvider {
    /// Create a new Tushare provider with the given API token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self::with_client(client, token)
    }

    /// Create a new Tushare provider with a custom HTTP client.
    #[must_use]
    pub fn with_client(client: Client, token: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
            base_url: TUSHARE_BASE_URL.to_string(),
        }
    }

    /// Points the provider at another endpoint (proxy or mirror).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Calls one Tushare API and returns its table.
    async fn call(&self, api_name: &str, params: Value, fields: &str) -> Result<Table> {
        if self.token.trim().is_empty() {
            return Err(DataError::AuthenticationFailed {
                provider: PROVIDER_NAME.to_string(),
                reason: "no API token configured".to_string(),
            });
        }
        debug!(api_name, "Tushare request");

        let body = ApiRequest {
            api_name,
            token: &self.token,
            params,
            fields,
        };
        let response = self
            .client
            .post(&self.base_url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DataError::from_status(PROVIDER_NAME, status.as_u16(), text));
        }

        let text = response.text().await.map_err(transport_error)?;
        parse_response(&text)
    }

    async fn latest_quotes(&self, symbols: &[Symbol]) -> Result<Vec<Quote>> {
        let end = market_today();
        let start = end - chrono::Duration::days(QUOTE_LOOKBACK_DAYS);
        let codes = symbols
            .iter()
            .map(|s| SymbolScheme::Canonical.encode(s))
            .collect::<Vec<_>>()
            .join(",");
        let table = self
            .call(
                "daily",
                json!({
                    "ts_code": codes,
                    "start_date": compact_date(start),
                    "end_date": compact_date(end),
                }),
                DAILY_FIELDS,
            )
            .await?;
        Ok(latest_quotes(&table))
    }

    async fn bars(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
        frequency: DataFrequency,
    ) -> Result<Vec<OhlcvBar>> {
        let api_name = match frequency {
            DataFrequency::Daily => "daily",
            DataFrequency::Weekly => "weekly",
            DataFrequency::Monthly => "monthly",
            other => {
                return Err(DataError::NotSupported(format!(
                    "Tushare does not serve {other} bars"
                )));
            }
        };
        let table = self
            .call(
                api_name,
                json!({
                    "ts_code": SymbolScheme::Canonical.encode(symbol),
                    "start_date": compact_date(start),
                    "end_date": compact_date(end),
                }),
                DAILY_FIELDS,
            )
            .await?;
        Ok(parse_bars(&table))
    }

    async fn listed_stocks(&self) -> Result<Table> {
        self.call("stock_basic", json!({ "list_status": "L" }), BASIC_FIELDS)
            .await
    }

    /// Per-stock valuation metrics of the latest trading day with data.
    async fn latest_valuations(&self) -> Result<Table> {
        let today = market_today();
        for offset in 0..QUOTE_LOOKBACK_DAYS {
            let day = today - chrono::Duration::days(offset);
            if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                continue;
            }
            let table = self
                .call(
                    "daily_basic",
                    json!({ "trade_date": compact_date(day) }),
                    VALUATION_FIELDS,
                )
                .await?;
            if table.rows().next().is_some() {
                return Ok(table);
            }
            debug!(%day, "No daily_basic rows, trying the previous day");
        }
        Ok(Table::default())
    }

    async fn financials(
        &self,
        symbol: &Symbol,
        year: i32,
        quarter: u8,
    ) -> Result<Option<FinancialStatement>> {
        let Some(period_end) = FinancialStatement::quarter_end(year, quarter) else {
            return Err(DataError::InvalidParameter(format!(
                "quarter {quarter} is not in 1-4"
            )));
        };
        let params = json!({
            "ts_code": SymbolScheme::Canonical.encode(symbol),
            "period": compact_date(period_end),
        });
        let income = self.call("income", params.clone(), INCOME_FIELDS).await?;
        let balance = self.call("balancesheet", params, BALANCE_FIELDS).await?;
        Ok(parse_statement(symbol, year, quarter, &income, &balance))
    }
}

#[async_trait]
impl DataProvider for TushareProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn description(&self) -> &str {
        "Tushare Pro token-authenticated market and fundamental data"
    }

    fn capabilities(&self) -> &[Operation] {
        CAPABILITIES
    }

    fn supported_frequencies(&self) -> &[DataFrequency] {
        SUPPORTED_FREQUENCIES
    }

    fn symbol_scheme(&self) -> SymbolScheme {
        SymbolScheme::Canonical
    }

    async fn execute(&self, request: &Request) -> Result<Option<Record>> {
        match request {
            Request::Quote { symbol } => {
                let quotes = self.latest_quotes(std::slice::from_ref(symbol)).await?;
                Ok(quotes.into_iter().next().map(Record::Quote))
            }
            Request::BatchQuote { symbols } => {
                let quotes = self.latest_quotes(symbols).await?;
                Ok((!quotes.is_empty()).then_some(Record::Quotes(quotes)))
            }
            Request::HistoricalBars {
                symbol,
                start,
                end,
                frequency,
            } => {
                let bars = self.bars(symbol, *start, *end, *frequency).await?;
                Ok((!bars.is_empty()).then_some(Record::Bars(bars)))
            }
            Request::IndustryList => {
                let industries = parse_industries(&self.listed_stocks().await?);
                Ok((!industries.is_empty()).then_some(Record::Industries(industries)))
            }
            Request::IndustryStocks { industry } => {
                let members = parse_members(&self.listed_stocks().await?, industry);
                Ok((!members.is_empty()).then_some(Record::Constituents(members)))
            }
            Request::CompanyInfo { symbol } => {
                let table = self
                    .call(
                        "stock_basic",
                        json!({ "ts_code": SymbolScheme::Canonical.encode(symbol) }),
                        BASIC_FIELDS,
                    )
                    .await?;
                Ok(parse_company(&table).map(Record::Company))
            }
            Request::Financials {
                symbol,
                year,
                quarter,
            } => Ok(self
                .financials(symbol, *year, *quarter)
                .await?
                .map(Record::Financials)),
            Request::IndustryValuations => {
                let basic = self.listed_stocks().await?;
                let metrics = self.latest_valuations().await?;
                let valuations = parse_valuations(&basic, &metrics);
                Ok((!valuations.is_empty()).then_some(Record::Valuations(valuations)))
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

/// Decodes the response envelope and maps Tushare error codes.
fn parse_response(text: &str) -> Result<Table> {
    let response: ApiResponse = serde_json::from_str(text)
        .map_err(|e| DataError::malformed(PROVIDER_NAME, e.to_string()))?;
    let message = response.msg.unwrap_or_default();

    match response.code {
        0 => Ok(response.data.unwrap_or_default()),
        RATE_LIMIT_CODE => Err(DataError::RateLimited {
            provider: PROVIDER_NAME.to_string(),
            retry_after: Some(Duration::from_secs(60)),
        }),
        code if TOKEN_ERROR_CODES.contains(&code) => Err(DataError::AuthenticationFailed {
            provider: PROVIDER_NAME.to_string(),
            reason: message,
        }),
        code => Err(DataError::Provider {
            provider: PROVIDER_NAME.to_string(),
            code: code.to_string(),
            message,
        }),
    }
}

fn row_to_quote(row: &Row<'_>) -> Option<Quote> {
    let symbol = row.symbol("ts_code")?;
    let price = row.f64("close")?;
    Some(Quote {
        open: row.f64("open"),
        high: row.f64("high"),
        low: row.f64("low"),
        prev_close: row.f64("pre_close"),
        volume: row.f64("vol").map(|v| v * SHARES_PER_LOT),
        amount: row.f64("amount").map(|v| v * AMOUNT_UNIT),
        timestamp: row.date("trade_date").and_then(session_close),
        ..Quote::new(symbol, price)
    })
}

/// Keeps the most recent trading day per symbol, ordered by symbol.
fn latest_quotes(table: &Table) -> Vec<Quote> {
    let mut latest: HashMap<Symbol, (NaiveDate, Row<'_>)> = HashMap::new();
    for row in table.rows() {
        let (Some(symbol), Some(date)) = (row.symbol("ts_code"), row.date("trade_date")) else {
            continue;
        };
        if latest.get(&symbol).is_none_or(|(seen, _)| *seen < date) {
            latest.insert(symbol, (date, row));
        }
    }

    let mut quotes: Vec<Quote> = latest
        .values()
        .filter_map(|(_, row)| row_to_quote(row))
        .collect();
    quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    quotes
}

/// Bars in ascending time order; Tushare returns newest first.
fn parse_bars(table: &Table) -> Vec<OhlcvBar> {
    let mut bars: Vec<OhlcvBar> = table
        .rows()
        .filter_map(|row| {
            let timestamp = session_close(row.date("trade_date")?)?;
            let bar = OhlcvBar::new(
                timestamp,
                row.f64("open")?,
                row.f64("high")?,
                row.f64("low")?,
                row.f64("close")?,
                row.f64("vol").unwrap_or(0.0) * SHARES_PER_LOT,
            );
            Some(match row.f64("amount") {
                Some(amount) => bar.with_amount(amount * AMOUNT_UNIT),
                None => bar,
            })
        })
        .collect();
    bars.sort_by_key(|b| b.timestamp);
    bars
}

fn parse_industries(table: &Table) -> Vec<Industry> {
    table
        .rows()
        .filter_map(|row| row.str("industry"))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(Industry::new)
        .collect()
}

fn parse_members(table: &Table, industry: &str) -> Vec<IndustryMember> {
    let industry = industry.trim();
    table
        .rows()
        .filter(|row| row.str("industry") == Some(industry))
        .filter_map(|row| {
            Some(IndustryMember {
                symbol: row.symbol("ts_code")?,
                name: row.str("name")?.to_string(),
            })
        })
        .collect()
}

#[derive(Default)]
struct IndustryTotals {
    stocks: usize,
    pe: Vec<f64>,
    pb: Vec<f64>,
    market_value: f64,
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Groups per-stock metrics by the industry `stock_basic` assigns them.
///
/// PE falls back to trailing PE. Averages only count stocks that report the
/// figure; loss makers without a PE are left out rather than read as zero.
fn parse_valuations(basic: &Table, metrics: &Table) -> Vec<Industry> {
    let industry_of: HashMap<Symbol, &str> = basic
        .rows()
        .filter_map(|row| Some((row.symbol("ts_code")?, row.str("industry")?)))
        .collect();

    let mut totals: BTreeMap<&str, IndustryTotals> = BTreeMap::new();
    for row in metrics.rows() {
        let Some(industry) = row.symbol("ts_code").and_then(|s| industry_of.get(&s).copied())
        else {
            continue;
        };
        let entry = totals.entry(industry).or_default();
        entry.stocks += 1;
        if let Some(pe) = row.f64("pe").or_else(|| row.f64("pe_ttm")) {
            entry.pe.push(pe);
        }
        if let Some(pb) = row.f64("pb") {
            entry.pb.push(pb);
        }
        entry.market_value += row.f64("total_mv").unwrap_or(0.0) * MARKET_VALUE_UNIT;
    }

    totals
        .into_iter()
        .map(|(name, totals)| {
            let mut industry = Industry::new(name).with_valuation(
                mean(&totals.pe),
                mean(&totals.pb),
                Some(totals.market_value),
            );
            industry.stock_count = Some(totals.stocks);
            industry
        })
        .collect()
}

fn parse_company(table: &Table) -> Option<CompanyInfo> {
    let row = table.rows().next()?;
    let mut info = CompanyInfo::new(row.symbol("ts_code")?, row.str("name")?);
    info.industry = row.str("industry").map(str::to_string);
    info.area = row.str("area").map(str::to_string);
    info.market = row.str("market").map(str::to_string);
    info.list_date = row.date("list_date");
    Some(info)
}

fn parse_statement(
    symbol: &Symbol,
    year: i32,
    quarter: u8,
    income: &Table,
    balance: &Table,
) -> Option<FinancialStatement> {
    let period_end = FinancialStatement::quarter_end(year, quarter)?;
    let mut statement = FinancialStatement::new(symbol.clone(), period_end, year, quarter);

    if let Some(row) = income.rows().next() {
        statement.revenue = row.f64("total_revenue");
        statement.operating_income = row.f64("operate_profit");
        statement.net_income = row.f64("n_income_attr_p");
        statement.eps_basic = row.f64("basic_eps");
    }
    if let Some(row) = balance.rows().next() {
        statement.total_assets = row.f64("total_assets");
        statement.total_liabilities = row.f64("total_liab");
        statement.stockholders_equity = row.f64("total_hldr_eqy_exc_min_int");
    }

    if let (Some(income), Some(revenue)) = (statement.net_income, statement.revenue) {
        if revenue != 0.0 {
            statement.net_margin = Some(income / revenue * 100.0);
        }
    }
    if let (Some(liabilities), Some(assets)) = (statement.total_liabilities, statement.total_assets)
    {
        if assets != 0.0 {
            statement.debt_to_assets = Some(liabilities / assets * 100.0);
        }
    }

    (!statement.is_blank()).then_some(statement)
}

// ============================================================================
// Tushare API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    api_name: &'a str,
    token: &'a str,
    params: Value,
    fields: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    msg: Option<String>,
    data: Option<Table>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn table(json: &str) -> Table {
        parse_response(json).unwrap()
    }

    const DAILY: &str = r#"{"code":0,"msg":"","data":{
        "fields":["ts_code","trade_date","open","high","low","close","pre_close","vol","amount"],
        "items":[
            ["600000.SH","20240105",7.28,7.35,7.25,7.31,7.28,345678.0,252000.5],
            ["000001.SZ","20240105",9.40,9.55,9.38,9.50,9.41,1200000.0,1134000.0],
            ["600000.SH","20240104",7.20,7.30,7.18,7.28,7.21,300000.0,217000.0]
        ]}}"#;

    #[test]
    fn test_error_codes() {
        let rate = parse_response(r#"{"code":40203,"msg":"每分钟最多访问该接口200次"}"#);
        assert!(matches!(rate, Err(DataError::RateLimited { .. })));

        let token = parse_response(r#"{"code":40101,"msg":"token不对"}"#);
        assert!(matches!(token, Err(DataError::AuthenticationFailed { .. })));

        let other = parse_response(r#"{"code":-2001,"msg":"参数错误"}"#);
        assert!(matches!(other, Err(DataError::Provider { ref code, .. }) if code == "-2001"));

        let garbage = parse_response("<html>502</html>");
        assert!(matches!(garbage, Err(DataError::MalformedResponse { .. })));
    }

    #[test]
    fn test_null_data_is_empty_table() {
        let table = table(r#"{"code":0,"msg":"","data":null}"#);
        assert_eq!(table.rows().count(), 0);
    }

    #[test]
    fn test_latest_quotes_keep_newest_day_per_symbol() {
        let quotes = latest_quotes(&table(DAILY));
        assert_eq!(quotes.len(), 2);

        let pufa = quotes
            .iter()
            .find(|q| q.symbol.to_string() == "600000.SH")
            .unwrap();
        assert_eq!(pufa.price, 7.31);
        assert_eq!(pufa.volume, Some(34_567_800.0));
        assert_eq!(pufa.amount, Some(252_000_500.0));
        assert_eq!(pufa.timestamp.unwrap().day(), 5);
    }

    #[test]
    fn test_bars_are_ascending() {
        let bars = parse_bars(&table(DAILY));
        assert_eq!(bars.len(), 3);
        assert!(bars.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(bars[0].timestamp.hour(), 7);
    }

    #[test]
    fn test_industries_and_members() {
        let basic = table(
            r#"{"code":0,"msg":"","data":{
            "fields":["ts_code","name","industry","area","market","list_date"],
            "items":[
                ["600000.SH","浦发银行","银行","上海","主板","19991110"],
                ["000001.SZ","平安银行","银行","深圳","主板","19910403"],
                ["600519.SH","贵州茅台","白酒","贵州","主板","20010827"],
                ["830799.BJ","艾融软件","软件服务","上海","北交所","20190712"]
            ]}}"#,
        );

        let industries: Vec<String> = parse_industries(&basic).into_iter().map(|i| i.name).collect();
        assert_eq!(industries, vec!["白酒", "软件服务", "银行"]);

        let banks = parse_members(&basic, "银行");
        assert_eq!(banks.len(), 2);
        assert_eq!(banks[1].name, "平安银行");

        let info = parse_company(&basic).unwrap();
        assert_eq!(info.name, "浦发银行");
        assert_eq!(info.list_date, NaiveDate::from_ymd_opt(1999, 11, 10));
    }

    #[test]
    fn test_valuations_group_by_industry() {
        let basic = table(
            r#"{"code":0,"msg":"","data":{
            "fields":["ts_code","name","industry"],
            "items":[
                ["600000.SH","浦发银行","银行"],
                ["000001.SZ","平安银行","银行"],
                ["600519.SH","贵州茅台","白酒"]
            ]}}"#,
        );
        let metrics = table(
            r#"{"code":0,"msg":"","data":{
            "fields":["ts_code","trade_date","pe","pe_ttm","pb","total_mv"],
            "items":[
                ["600000.SH","20240105",5.0,5.2,0.4,21456000.0],
                ["000001.SZ","20240105",null,7.0,0.6,18435000.0],
                ["600519.SH","20240105",30.5,29.8,9.1,null],
                ["688981.SH","20240105",80.0,75.0,3.2,40000000.0]
            ]}}"#,
        );

        let valuations = parse_valuations(&basic, &metrics);
        let names: Vec<&str> = valuations.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["白酒", "银行"]);

        let banks = &valuations[1];
        assert_eq!(banks.stock_count, Some(2));
        assert_eq!(banks.pe, Some(6.0));
        assert_eq!(banks.pb, Some(0.5));
        assert_eq!(banks.market_cap, Some(398_910_000_000.0));

        let liquor = &valuations[0];
        assert_eq!(liquor.pe, Some(30.5));
        assert_eq!(liquor.market_cap, Some(0.0));
    }

    #[test]
    fn test_valuations_without_metrics_are_empty() {
        let basic = table(
            r#"{"code":0,"msg":"","data":{"fields":["ts_code","industry"],
            "items":[["600000.SH","银行"]]}}"#,
        );
        assert!(parse_valuations(&basic, &Table::default()).is_empty());
    }

    #[test]
    fn test_statement_merges_income_and_balance() {
        let symbol = Symbol::parse("600519.SH").unwrap();
        let income = table(
            r#"{"code":0,"msg":"","data":{
            "fields":["ts_code","end_date","total_revenue","operate_profit","n_income_attr_p","basic_eps"],
            "items":[["600519.SH","20231231",150560330316.45,103924806050.71,74734071550.75,59.49]]}}"#,
        );
        let balance = table(
            r#"{"code":0,"msg":"","data":{
            "fields":["ts_code","end_date","total_assets","total_liab","total_hldr_eqy_exc_min_int"],
            "items":[["600519.SH","20231231",272699660471.10,46398580666.21,215668571546.64]]}}"#,
        );

        let statement = parse_statement(&symbol, 2023, 4, &income, &balance).unwrap();
        assert_eq!(statement.eps_basic, Some(59.49));
        assert!(statement.total_assets.is_some());
        assert!(statement.net_margin.unwrap() > 49.0);
        assert!(statement.debt_to_assets.unwrap() < 20.0);
    }

    #[test]
    fn test_statement_without_rows_is_none() {
        let symbol = Symbol::parse("600519.SH").unwrap();
        let empty = Table::default();
        assert!(parse_statement(&symbol, 2023, 4, &empty, &empty).is_none());
    }

    #[tokio::test]
    async fn test_missing_token_fails_fast() {
        let provider = TushareProvider::new("").with_base_url("http://127.0.0.1:9");
        let symbol = Symbol::parse("600000.SH").unwrap();
        let err = provider
            .execute(&Request::Quote { symbol })
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::AuthenticationFailed { .. }));
    }

    #[test]
    fn test_provider_metadata() {
        let provider = TushareProvider::new("test_token");
        assert_eq!(provider.name(), "tushare");
        assert!(provider.supports(Operation::Financials));
        assert!(provider.supports(Operation::IndustryValuations));
        assert!(!provider.supports(Operation::MarketIndex));
        assert_eq!(provider.supported_frequencies(), SUPPORTED_FREQUENCIES);
    }

    #[test]
    fn test_debug_redacts_token() {
        let provider = TushareProvider::new("secret_token_12345");
        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
