#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/feed/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! BaoStock data provider.
//!
//! BaoStock is stateful: every query carries the token of a prior login. The
//! provider owns a [`SessionManager`] so that concurrent first calls share a
//! single login. A query rejected with an unknown-session code or an HTTP 401
//! marks the session expired before surfacing [`DataError::SessionExpired`].
//! The registry's retrier then logs in again and repeats the query.
//!
//! # Example
//!
//! ```no_run
//! use feed_baostock::BaostockProvider;
//! use feed_core::{DataFrequency, DataProvider, Request, Symbol};
//! use chrono::NaiveDate;
//!
//! # async fn example() -> feed_core::Result<()> {
//! let provider = BaostockProvider::anonymous();
//! let request = Request::HistoricalBars {
//!     symbol: Symbol::parse("600000.SH")?,
//!     start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!     end: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
//!     frequency: DataFrequency::Daily,
//! };
//! let record = provider.execute(&request).await?;
//! provider.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod rpc;

pub use rpc::{HttpTransport, PROTOCOL_VERSION, RpcTransport};

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use feed_core::{
    Authenticator, CompanyInfo, DataError, DataFrequency, DataProvider, FinancialStatement,
    Industry, IndustryMember, OhlcvBar, Operation, Record, Request, Result, SessionManager, Symbol,
    SymbolScheme,
    time::{local_to_utc, session_close},
};
use tracing::debug;

use crate::rpc::{
    BALANCE, K_DATA, LOGIN, LOGOUT, Method, PROFIT, ResultSet, Row, STOCK_BASIC, STOCK_INDUSTRY,
    decode_frame, encode_frame,
};

/// Registry name of this provider.
pub const PROVIDER_NAME: &str = "baostock";

/// Default BaoStock gateway.
pub const BAOSTOCK_BASE_URL: &str = "http://public-api.baostock.com:10030";

/// Account BaoStock accepts for public data.
pub const ANONYMOUS_USER: &str = "anonymous";
/// Password of the anonymous account.
pub const ANONYMOUS_PASSWORD: &str = "123456";

/// Rows requested per query page.
const PAGE_SIZE: &str = "10000";

/// Unadjusted prices.
const NO_ADJUST: &str = "3";

const DAILY_FIELDS: &str = "date,code,open,high,low,close,volume,amount";
const INTRADAY_FIELDS: &str = "date,time,code,open,high,low,close,volume,amount";

const CAPABILITIES: &[Operation] = &[
    Operation::HistoricalBars,
    Operation::IndustryList,
    Operation::IndustryStocks,
    Operation::CompanyInfo,
    Operation::Financials,
];

const SUPPORTED_FREQUENCIES: &[DataFrequency] = &[
    DataFrequency::FiveMinute,
    DataFrequency::FifteenMinute,
    DataFrequency::ThirtyMinute,
    DataFrequency::Hourly,
    DataFrequency::Daily,
    DataFrequency::Weekly,
    DataFrequency::Monthly,
];

/// Logs in to BaoStock over an [`RpcTransport`].
pub struct BaostockAuth {
    transport: Arc<dyn RpcTransport>,
    user: String,
    password: String,
}

impl fmt::Debug for BaostockAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaostockAuth")
            .field("transport", &self.transport)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl BaostockAuth {
    /// Authenticator for `user` / `password`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn RpcTransport>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            user: user.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl Authenticator for BaostockAuth {
    async fn login(&self) -> Result<String> {
        let frame = encode_frame(LOGIN, &[LOGIN.name, &self.user, &self.password, "0"]);
        let response = self.transport.exchange(&frame).await?;
        let fields = decode_frame(&response, LOGIN).map_err(|err| match err {
            DataError::Provider { message, code, .. } => DataError::AuthenticationFailed {
                provider: PROVIDER_NAME.to_string(),
                reason: format!("{message} ({code})"),
            },
            other => other,
        })?;
        fields
            .into_iter()
            .next()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| DataError::malformed(PROVIDER_NAME, "login returned no token"))
    }

    async fn logout(&self, token: &str) -> Result<()> {
        let frame = encode_frame(LOGOUT, &[LOGOUT.name, token]);
        let response = self.transport.exchange(&frame).await?;
        decode_frame(&response, LOGOUT).map(|_| ())
    }
}

/// BaoStock data provider.
#[derive(Debug)]
pub struct BaostockProvider {
    transport: Arc<dyn RpcTransport>,
    session: SessionManager,
}

impl BaostockProvider {
    /// Provider talking to `base_url` with the given credentials.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::with_transport(Arc::new(HttpTransport::new(base_url)), user, password)
    }

    /// Provider on the public gateway with anonymous credentials.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(BAOSTOCK_BASE_URL, ANONYMOUS_USER, ANONYMOUS_PASSWORD)
    }

    /// Provider over a custom transport.
    #[must_use]
    pub fn with_transport(
        transport: Arc<dyn RpcTransport>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let auth = BaostockAuth::new(Arc::clone(&transport), user, password);
        Self {
            transport,
            session: SessionManager::new(PROVIDER_NAME, Arc::new(auth)),
        }
    }

    /// Logs in again once a session is older than `max_age`.
    #[must_use]
    pub fn with_session_max_age(mut self, max_age: Duration) -> Self {
        self.session = self.session.with_max_age(max_age);
        self
    }

    /// Runs one query under the current session.
    async fn query(&self, method: Method, params: &[&str]) -> Result<ResultSet> {
        let session = self.session.ensure_session().await?;
        let mut fields = vec![method.name, session.token(), "1", PAGE_SIZE];
        fields.extend_from_slice(params);

        debug!(method = method.name, "BaoStock query");
        // The gateway reports a dead token either as an HTTP 401 or as an
        // error code inside the frame; both must expire the session.
        let outcome = self
            .transport
            .exchange(&encode_frame(method, &fields))
            .await
            .and_then(|response| decode_frame(&response, method));
        match outcome {
            Ok(body) => ResultSet::from_fields(&body),
            Err(err @ DataError::SessionExpired(_)) => {
                self.session.mark_expired(&session).await;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn bars(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
        frequency: DataFrequency,
    ) -> Result<Vec<OhlcvBar>> {
        let period = frequency_code(frequency).ok_or_else(|| {
            DataError::NotSupported(format!("BaoStock does not serve {frequency} bars"))
        })?;
        let fields = if frequency.is_intraday() {
            INTRADAY_FIELDS
        } else {
            DAILY_FIELDS
        };
        let code = SymbolScheme::DottedPrefix.encode(symbol);
        let (start, end) = (start.to_string(), end.to_string());
        let params = [
            code.as_str(),
            fields,
            start.as_str(),
            end.as_str(),
            period,
            NO_ADJUST,
        ];
        let set = self.query(K_DATA, &params).await?;
        Ok(parse_bars(&set, frequency.is_intraday()))
    }

    async fn industries(&self, symbol: Option<&Symbol>) -> Result<ResultSet> {
        let code = symbol
            .map(|s| SymbolScheme::DottedPrefix.encode(s))
            .unwrap_or_default();
        self.query(STOCK_INDUSTRY, &[code.as_str(), ""]).await
    }

    async fn company_info(&self, symbol: &Symbol) -> Result<Option<CompanyInfo>> {
        let code = SymbolScheme::DottedPrefix.encode(symbol);
        let basic = self.query(STOCK_BASIC, &[code.as_str(), ""]).await?;
        let Some(mut info) = parse_company(&basic) else {
            return Ok(None);
        };
        let industry = self.industries(Some(symbol)).await?;
        info.industry = industry
            .rows()
            .find(|row| row.get("code") == Some(code.as_str()))
            .and_then(|row| row.get("industry"))
            .map(str::to_string);
        Ok(Some(info))
    }

    async fn financials(
        &self,
        symbol: &Symbol,
        year: i32,
        quarter: u8,
    ) -> Result<Option<FinancialStatement>> {
        let code = SymbolScheme::DottedPrefix.encode(symbol);
        let (year_param, quarter_param) = (year.to_string(), quarter.to_string());
        let params = [code.as_str(), year_param.as_str(), quarter_param.as_str()];

        let profit = self.query(PROFIT, &params).await?;
        let balance = self.query(BALANCE, &params).await?;
        Ok(parse_statement(symbol, year, quarter, &profit, &balance))
    }
}

#[async_trait]
impl DataProvider for BaostockProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn description(&self) -> &str {
        "BaoStock session-based history, reference and financial data"
    }

    fn capabilities(&self) -> &[Operation] {
        CAPABILITIES
    }

    fn supported_frequencies(&self) -> &[DataFrequency] {
        SUPPORTED_FREQUENCIES
    }

    fn symbol_scheme(&self) -> SymbolScheme {
        SymbolScheme::DottedPrefix
    }

    fn session(&self) -> Option<&SessionManager> {
        Some(&self.session)
    }

    async fn execute(&self, request: &Request) -> Result<Option<Record>> {
        match request {
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
                let industries = parse_industries(&self.industries(None).await?);
                Ok((!industries.is_empty()).then_some(Record::Industries(industries)))
            }
            Request::IndustryStocks { industry } => {
                let members = parse_members(&self.industries(None).await?, industry);
                Ok((!members.is_empty()).then_some(Record::Constituents(members)))
            }
            Request::CompanyInfo { symbol } => {
                Ok(self.company_info(symbol).await?.map(Record::Company))
            }
            Request::Financials {
                symbol,
                year,
                quarter,
            } => Ok(self
                .financials(symbol, *year, *quarter)
                .await?
                .map(Record::Financials)),
            other => Err(DataError::UnsupportedOperation(other.operation())),
        }
    }

    async fn shutdown(&self) -> Result<()> {
        self.session.logout().await
    }
}

const fn frequency_code(frequency: DataFrequency) -> Option<&'static str> {
    match frequency {
        DataFrequency::FiveMinute => Some("5"),
        DataFrequency::FifteenMinute => Some("15"),
        DataFrequency::ThirtyMinute => Some("30"),
        DataFrequency::Hourly => Some("60"),
        DataFrequency::Daily => Some("d"),
        DataFrequency::Weekly => Some("w"),
        DataFrequency::Monthly => Some("m"),
        DataFrequency::Minute => None,
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Minute bars carry `YYYYMMDDHHMMSSsss` in the `time` column.
fn parse_bar_time(row: &Row<'_>, intraday: bool) -> Option<chrono::DateTime<chrono::Utc>> {
    if intraday {
        let time = row.get("time")?;
        let seconds = time.get(..14)?;
        local_to_utc(NaiveDateTime::parse_from_str(seconds, "%Y%m%d%H%M%S").ok()?)
    } else {
        session_close(parse_date(row.get("date")?)?)
    }
}

fn parse_bars(set: &ResultSet, intraday: bool) -> Vec<OhlcvBar> {
    let mut bars: Vec<OhlcvBar> = set
        .rows()
        .filter_map(|row| {
            let bar = OhlcvBar::new(
                parse_bar_time(&row, intraday)?,
                row.f64("open")?,
                row.f64("high")?,
                row.f64("low")?,
                row.f64("close")?,
                row.f64("volume").unwrap_or(0.0),
            );
            Some(match row.f64("amount") {
                Some(amount) => bar.with_amount(amount),
                None => bar,
            })
        })
        .collect();
    bars.sort_by_key(|b| b.timestamp);
    bars
}

fn parse_company(set: &ResultSet) -> Option<CompanyInfo> {
    let row = set.rows().next()?;
    let symbol = SymbolScheme::DottedPrefix.decode(row.get("code")?).ok()?;
    let mut info = CompanyInfo::new(symbol, row.get("code_name")?);
    info.list_date = row.get("ipoDate").and_then(parse_date);
    Some(info)
}

fn parse_industries(set: &ResultSet) -> Vec<Industry> {
    set.rows()
        .filter_map(|row| row.get("industry"))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(Industry::new)
        .collect()
}

fn parse_members(set: &ResultSet, industry: &str) -> Vec<IndustryMember> {
    let industry = industry.trim();
    set.rows()
        .filter(|row| row.get("industry") == Some(industry))
        .filter_map(|row| {
            Some(IndustryMember {
                symbol: SymbolScheme::DottedPrefix.decode(row.get("code")?).ok()?,
                name: row.get("code_name")?.to_string(),
            })
        })
        .collect()
}

fn percent(row: &Row<'_>, column: &str) -> Option<f64> {
    row.f64(column).map(|ratio| ratio * 100.0)
}

fn parse_statement(
    symbol: &Symbol,
    year: i32,
    quarter: u8,
    profit: &ResultSet,
    balance: &ResultSet,
) -> Option<FinancialStatement> {
    let period_end = FinancialStatement::quarter_end(year, quarter)?;
    let mut statement = FinancialStatement::new(symbol.clone(), period_end, year, quarter);

    if let Some(row) = profit.rows().next() {
        statement.revenue = row.f64("MBRevenue");
        statement.net_income = row.f64("netProfit");
        statement.eps_basic = row.f64("epsTTM");
        statement.net_margin = percent(&row, "npMargin");
        statement.roe = percent(&row, "roeAvg");
    }
    if let Some(row) = balance.rows().next() {
        let mut solvency = FinancialStatement::new(symbol.clone(), period_end, year, quarter);
        solvency.current_ratio = row.f64("currentRatio");
        solvency.debt_to_assets = percent(&row, "liabilityToAsset");
        statement.merge_missing(&solvency);
    }

    (!statement.is_blank()).then_some(statement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::response_frame;
    use chrono::Timelike;
    use feed_core::{Retrier, RetryPolicy, SessionState};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;

    /// In-memory BaoStock that answers by message type.
    #[derive(Debug, Default)]
    struct FakeServer {
        logins: AtomicU32,
        logouts: AtomicU32,
        expire_next_query: AtomicBool,
        reject_login: bool,
        unauthorized_token: Option<&'static str>,
    }

    fn records(columns: &str, rows: &[&[&str]]) -> Vec<String> {
        let rows: Vec<Vec<&str>> = rows.iter().map(|r| r.to_vec()).collect();
        vec![
            columns.to_string(),
            serde_json::json!({ "record": rows }).to_string(),
        ]
    }

    fn answer(method: Method, body: Vec<String>) -> String {
        let fields: Vec<&str> = body.iter().map(String::as_str).collect();
        response_frame(method, "0", &fields)
    }

    #[async_trait]
    impl RpcTransport for FakeServer {
        async fn exchange(&self, frame: &str) -> Result<String> {
            let msg_type = frame.split('\x01').nth(1).unwrap_or_default();
            let token = frame.split('\x01').nth(4).unwrap_or_default();
            if msg_type != "00" && self.unauthorized_token == Some(token) {
                return Err(DataError::from_status(PROVIDER_NAME, 401, "Unauthorized"));
            }
            let reply = match msg_type {
                "00" if self.reject_login => response_frame(LOGIN, "10001002", &[]),
                "00" => {
                    let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
                    response_frame(LOGIN, "0", &[&format!("token-{n}")])
                }
                "02" => {
                    self.logouts.fetch_add(1, Ordering::SeqCst);
                    response_frame(LOGOUT, "0", &[])
                }
                "95" if self.expire_next_query.swap(false, Ordering::SeqCst) => {
                    response_frame(K_DATA, "10001001", &[])
                }
                "95" => answer(
                    K_DATA,
                    records(
                        DAILY_FIELDS,
                        &[
                            &["2024-01-03", "sh.600000", "7.20", "7.30", "7.18", "7.28", "30000000", "217000000.00"],
                            &["2024-01-02", "sh.600000", "7.25", "7.27", "7.15", "7.21", "28000000", "201000000.00"],
                            &["2024-01-04", "sh.600000", "", "", "", "", "0", ""],
                        ],
                    ),
                ),
                "45" => answer(
                    STOCK_BASIC,
                    records(
                        "code,code_name,ipoDate,outDate,type,status",
                        &[&["sh.600000", "浦发银行", "1999-11-10", "", "1", "1"]],
                    ),
                ),
                "59" => answer(
                    STOCK_INDUSTRY,
                    records(
                        "updateDate,code,code_name,industry,industryClassification",
                        &[
                            &["2024-01-02", "sh.600000", "浦发银行", "J66货币金融服务", "证监会行业分类"],
                            &["2024-01-02", "sz.000001", "平安银行", "J66货币金融服务", "证监会行业分类"],
                            &["2024-01-02", "sh.600519", "贵州茅台", "C15酒、饮料和精制茶制造业", "证监会行业分类"],
                        ],
                    ),
                ),
                "13" => answer(
                    PROFIT,
                    records(
                        "code,pubDate,statDate,roeAvg,npMargin,gpMargin,netProfit,epsTTM,MBRevenue,totalShare,liqaShare",
                        &[&["sh.600519", "2024-03-29", "2023-12-31", "0.34", "0.52", "0.91", "77520630000", "59.49", "", "1256197800", "1256197800"]],
                    ),
                ),
                "19" => answer(
                    BALANCE,
                    records(
                        "code,pubDate,statDate,currentRatio,quickRatio,cashRatio,YOYLiability,liabilityToAsset,assetToEquity",
                        &[&["sh.600519", "2024-03-29", "2023-12-31", "4.63", "3.67", "2.53", "0.08", "0.17", "1.21"]],
                    ),
                ),
                other => {
                    return Err(DataError::Other(format!("unexpected message type {other}")));
                }
            };
            Ok(reply)
        }
    }

    fn provider(server: &Arc<FakeServer>) -> BaostockProvider {
        let transport: Arc<dyn RpcTransport> = server.clone();
        BaostockProvider::with_transport(transport, ANONYMOUS_USER, ANONYMOUS_PASSWORD)
    }

    fn daily_request() -> Request {
        Request::HistoricalBars {
            symbol: Symbol::parse("600000.SH").unwrap(),
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            frequency: DataFrequency::Daily,
        }
    }

    #[tokio::test]
    async fn test_bars_log_in_once() {
        let server = Arc::new(FakeServer::default());
        let provider = provider(&server);

        let first = provider.execute(&daily_request()).await.unwrap().unwrap();
        provider.execute(&daily_request()).await.unwrap();

        let bars = first.into_bars().unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[0].timestamp < bars[1].timestamp);
        assert_eq!(bars[0].close, 7.21);
        assert_eq!(bars[0].timestamp.hour(), 7);
        assert_eq!(server.logins.load(Ordering::SeqCst), 1);
        assert_eq!(provider.session.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_rejected_session_is_marked_expired() {
        let server = Arc::new(FakeServer::default());
        let provider = provider(&server);
        server.expire_next_query.store(true, Ordering::SeqCst);

        let err = provider.execute(&daily_request()).await.unwrap_err();

        assert!(matches!(err, DataError::SessionExpired(_)));
        assert_eq!(provider.session.state(), SessionState::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrier_logs_in_again_after_expiry() {
        let server = Arc::new(FakeServer::default());
        let provider = provider(&server);
        server.expire_next_query.store(true, Ordering::SeqCst);
        let policy = RetryPolicy::new(3).with_jitter(Duration::ZERO);
        let request = daily_request();

        let (provider_ref, request_ref) = (&provider, &request);
        let record = Retrier::new(&policy)
            .with_session(provider.session())
            .for_provider(PROVIDER_NAME)
            .run(move || provider_ref.execute(request_ref))
            .await
            .unwrap();

        assert!(record.is_some());
        assert_eq!(server.logins.load(Ordering::SeqCst), 2);
        assert_eq!(provider.session.login_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_http_unauthorized_logs_in_again() {
        let server = Arc::new(FakeServer {
            unauthorized_token: Some("token-1"),
            ..FakeServer::default()
        });
        let provider = provider(&server);

        let err = provider.execute(&daily_request()).await.unwrap_err();
        assert!(matches!(err, DataError::SessionExpired(_)));
        assert_eq!(provider.session.state(), SessionState::Expired);

        let policy = RetryPolicy::new(3).with_jitter(Duration::ZERO);
        let request = daily_request();
        let (provider_ref, request_ref) = (&provider, &request);
        let record = Retrier::new(&policy)
            .with_session(provider.session())
            .for_provider(PROVIDER_NAME)
            .run(move || provider_ref.execute(request_ref))
            .await
            .unwrap();

        assert!(record.is_some());
        assert_eq!(server.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_session_is_replaced() {
        let server = Arc::new(FakeServer::default());
        let provider = provider(&server).with_session_max_age(Duration::from_secs(3600));

        provider.execute(&daily_request()).await.unwrap();
        tokio::time::advance(Duration::from_secs(1800)).await;
        provider.execute(&daily_request()).await.unwrap();
        assert_eq!(server.logins.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1801)).await;
        provider.execute(&daily_request()).await.unwrap();
        assert_eq!(server.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_login_failure() {
        let server = Arc::new(FakeServer {
            reject_login: true,
            ..FakeServer::default()
        });
        let provider = provider(&server);

        let err = provider.execute(&daily_request()).await.unwrap_err();

        assert!(matches!(err, DataError::AuthenticationFailed { .. }));
        assert_eq!(provider.session.state(), SessionState::NoSession);
    }

    #[tokio::test]
    async fn test_company_info_includes_industry() {
        let server = Arc::new(FakeServer::default());
        let provider = provider(&server);
        let symbol = Symbol::parse("600000.SH").unwrap();

        let info = provider
            .execute(&Request::CompanyInfo { symbol })
            .await
            .unwrap()
            .and_then(Record::into_company)
            .unwrap();

        assert_eq!(info.name, "浦发银行");
        assert_eq!(info.list_date, NaiveDate::from_ymd_opt(1999, 11, 10));
        assert_eq!(info.industry.as_deref(), Some("J66货币金融服务"));
    }

    #[tokio::test]
    async fn test_industries_and_members() {
        let server = Arc::new(FakeServer::default());
        let provider = provider(&server);

        let industries = provider
            .execute(&Request::IndustryList)
            .await
            .unwrap()
            .and_then(Record::into_industries)
            .unwrap();
        assert_eq!(industries.len(), 2);

        let members = provider
            .execute(&Request::IndustryStocks {
                industry: "J66货币金融服务".to_string(),
            })
            .await
            .unwrap()
            .and_then(Record::into_constituents)
            .unwrap();
        let codes: Vec<String> = members.iter().map(|m| m.symbol.to_string()).collect();
        assert_eq!(codes, vec!["600000.SH", "000001.SZ"]);

        let none = provider
            .execute(&Request::IndustryStocks {
                industry: "不存在".to_string(),
            })
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_financials_merge_profit_and_balance() {
        let server = Arc::new(FakeServer::default());
        let provider = provider(&server);
        let symbol = Symbol::parse("600519.SH").unwrap();

        let statement = provider
            .execute(&Request::Financials {
                symbol,
                year: 2023,
                quarter: 4,
            })
            .await
            .unwrap()
            .and_then(Record::into_financials)
            .unwrap();

        assert_eq!(statement.eps_basic, Some(59.49));
        assert!(statement.revenue.is_none());
        assert!((statement.roe.unwrap() - 34.0).abs() < 1e-9);
        assert!((statement.debt_to_assets.unwrap() - 17.0).abs() < 1e-9);
        assert_eq!(statement.current_ratio, Some(4.63));
    }

    #[tokio::test]
    async fn test_shutdown_logs_out_active_session() {
        let server = Arc::new(FakeServer::default());
        let provider = provider(&server);

        provider.shutdown().await.unwrap();
        assert_eq!(server.logouts.load(Ordering::SeqCst), 0);

        provider.execute(&daily_request()).await.unwrap();
        provider.shutdown().await.unwrap();
        assert_eq!(server.logouts.load(Ordering::SeqCst), 1);
        assert_eq!(provider.session.state(), SessionState::NoSession);
    }

    #[test]
    fn test_minute_time_column() {
        let set = ResultSet::from_fields(&records(
            INTRADAY_FIELDS,
            &[&["2024-01-02", "20240102093500000", "sh.600000", "7.25", "7.27", "7.24", "7.26", "100000", "726000"]],
        ))
        .unwrap();
        let bars = parse_bars(&set, true);
        assert_eq!(bars[0].timestamp.hour(), 1);
        assert_eq!(bars[0].timestamp.minute(), 35);
    }

    #[test]
    fn test_minute_frequency_unsupported() {
        assert!(frequency_code(DataFrequency::Minute).is_none());
        let provider = BaostockProvider::anonymous();
        assert!(!provider.supports_request(&Request::HistoricalBars {
            symbol: Symbol::parse("600000.SH").unwrap(),
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            frequency: DataFrequency::Minute,
        }));
    }

    #[test]
    fn test_debug_redacts_password() {
        let auth = BaostockAuth::new(
            Arc::new(HttpTransport::new(BAOSTOCK_BASE_URL)),
            "user",
            "hunter2-secret",
        );
        let debug_str = format!("{auth:?}");
        assert!(!debug_str.contains("hunter2-secret"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
