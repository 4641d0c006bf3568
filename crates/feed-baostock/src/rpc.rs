//! BaoStock framed RPC encoding.
//!
//! Every message is one frame:
//!
//! ```text
//! <version> \x01 <msg type> \x01 <body length, 10 digits> \x01 <body> \n
//! ```
//!
//! The body is a `\x01`-separated field list. Requests start with the method
//! name and the session token; responses start with an error code, an error
//! message and the method name.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use feed_core::{DataError, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::PROVIDER_NAME;

/// Protocol version sent in every frame header.
pub const PROTOCOL_VERSION: &str = "00.9.10";

const DELIMITER: char = '\x01';

const SUCCESS: &str = "0";

/// Server no longer knows the session; log in again.
const SESSION_GONE: &str = "10001001";

/// Server-side network fault; safe to retry.
const NETWORK_FAULT: &str = "10002007";

/// One RPC method and its request/response message types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Method {
    pub(crate) name: &'static str,
    pub(crate) request: &'static str,
    pub(crate) response: &'static str,
}

pub(crate) const LOGIN: Method = Method {
    name: "login",
    request: "00",
    response: "01",
};
pub(crate) const LOGOUT: Method = Method {
    name: "logout",
    request: "02",
    response: "03",
};
pub(crate) const PROFIT: Method = Method {
    name: "query_profit_data",
    request: "13",
    response: "14",
};
pub(crate) const BALANCE: Method = Method {
    name: "query_balance_data",
    request: "19",
    response: "20",
};
pub(crate) const STOCK_BASIC: Method = Method {
    name: "query_stock_basic",
    request: "45",
    response: "46",
};
pub(crate) const STOCK_INDUSTRY: Method = Method {
    name: "query_stock_industry",
    request: "59",
    response: "60",
};
pub(crate) const K_DATA: Method = Method {
    name: "query_history_k_data_plus",
    request: "95",
    response: "96",
};

/// Builds a request frame for `method` with the given body fields.
pub(crate) fn encode_frame(method: Method, fields: &[&str]) -> String {
    let body = fields.join("\x01");
    format!(
        "{PROTOCOL_VERSION}{DELIMITER}{}{DELIMITER}{:010}{DELIMITER}{body}\n",
        method.request,
        body.len()
    )
}

/// Decodes a response frame and returns its body fields after the error
/// code, message and method name.
pub(crate) fn decode_frame(frame: &str, method: Method) -> Result<Vec<String>> {
    let malformed = |detail: &str| DataError::malformed(PROVIDER_NAME, detail.to_string());
    let frame = frame.trim_end_matches(['\n', '\r']);

    let mut header = frame.splitn(4, DELIMITER);
    let (Some(_version), Some(msg_type), Some(length), Some(body)) =
        (header.next(), header.next(), header.next(), header.next())
    else {
        return Err(malformed("truncated frame header"));
    };
    if msg_type != method.response {
        return Err(malformed(&format!(
            "expected message type {} for {}, got {msg_type}",
            method.response, method.name
        )));
    }
    let length: usize = length
        .parse()
        .map_err(|_| malformed("body length is not a number"))?;
    if length != body.len() {
        return Err(malformed(&format!(
            "body length {} does not match header {length}",
            body.len()
        )));
    }

    let mut fields = body.split(DELIMITER).map(str::to_string);
    let code = fields.next().unwrap_or_default();
    let message = fields.next().unwrap_or_default();
    let _method = fields.next();

    match code.as_str() {
        SUCCESS => Ok(fields.collect()),
        SESSION_GONE => Err(DataError::SessionExpired(PROVIDER_NAME.to_string())),
        NETWORK_FAULT => Err(DataError::Network(format!("{PROVIDER_NAME}: {message}"))),
        _ => Err(DataError::Provider {
            provider: PROVIDER_NAME.to_string(),
            code,
            message,
        }),
    }
}

/// Column names plus string rows of a query response.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

#[derive(Deserialize)]
struct Records {
    #[serde(default)]
    record: Vec<Vec<String>>,
}

impl ResultSet {
    /// Parses `[columns, records json]` query body fields.
    pub(crate) fn from_fields(fields: &[String]) -> Result<Self> {
        let [columns, records, ..] = fields else {
            return Err(DataError::malformed(PROVIDER_NAME, "query body too short"));
        };
        let columns = columns
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        let rows = if records.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str::<Records>(records)
                .map_err(|e| DataError::malformed(PROVIDER_NAME, e.to_string()))?
                .record
        };
        Ok(Self { columns, rows })
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        self.rows.iter().map(move |values| Row {
            columns: &self.columns,
            values,
        })
    }
}

/// One result row, addressed by column name.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Row<'a> {
    columns: &'a [String],
    values: &'a [String],
}

impl<'a> Row<'a> {
    /// Non-empty trimmed cell.
    pub(crate) fn get(&self, column: &str) -> Option<&'a str> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.values
            .get(index)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub(crate) fn f64(&self, column: &str) -> Option<f64> {
        self.get(column)?.parse().ok()
    }
}

/// Carries one request frame to the server and returns the response frame.
#[async_trait]
pub trait RpcTransport: Send + Sync + fmt::Debug {
    /// Sends `frame` and waits for the matching response frame.
    async fn exchange(&self, frame: &str) -> Result<String>;
}

/// [`RpcTransport`] that POSTs frames to an HTTP gateway.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Transport posting to `url` with a 30 second timeout.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let timeout = Duration::from_secs(30);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn exchange(&self, frame: &str) -> Result<String> {
        debug!(url = %self.url, bytes = frame.len(), "BaoStock request");
        let transport_error = |e: reqwest::Error| {
            if e.is_timeout() {
                DataError::Timeout {
                    provider: PROVIDER_NAME.to_string(),
                    after: self.timeout,
                }
            } else {
                DataError::Network(e.to_string())
            }
        };

        let response = self
            .client
            .post(&self.url)
            .body(frame.to_string())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DataError::from_status(PROVIDER_NAME, status.as_u16(), text));
        }
        response.text().await.map_err(transport_error)
    }
}

#[cfg(test)]
pub(crate) fn response_frame(method: Method, code: &str, fields: &[&str]) -> String {
    let mut body = vec![code, if code == SUCCESS { "success" } else { "failed" }, method.name];
    body.extend_from_slice(fields);
    let body = body.join("\x01");
    format!(
        "{PROTOCOL_VERSION}\x01{}\x01{:010}\x01{body}\n",
        method.response,
        body.len()
    )
}
