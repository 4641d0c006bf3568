//! East Money payload decoding.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use feed_core::{
    DataError, Industry, IndustryMember, OhlcvBar, Quote, Result, Symbol, SymbolScheme,
    time::{local_to_utc, session_close},
};
use serde_json::Value;
use tracing::debug;

use crate::PROVIDER_NAME;

/// East Money reports volume in lots of 100 shares.
const SHARES_PER_LOT: f64 = 100.0;

/// Strips a `callback(...)` JSONP wrapper if present.
pub(crate) fn strip_jsonp(text: &str) -> &str {
    let text = text.trim();
    if text.starts_with('{') || text.starts_with('[') {
        return text;
    }
    match (text.find('('), text.rfind(')')) {
        (Some(open), Some(close)) if open < close => &text[open + 1..close],
        _ => text,
    }
}

/// Numeric field; `"-"` and other non-numeric placeholders read as `None`.
fn num(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty() && *s != "-")
}

/// `data` object of an envelope; `None` when absent or `null`.
fn data(body: &Value) -> Option<&Value> {
    body.get("data").filter(|d| !d.is_null())
}

/// List rows under `data.diff`, which arrives as an array or an index-keyed map.
fn diff_rows(body: &Value) -> Vec<&Value> {
    match data(body).and_then(|d| d.get("diff")) {
        Some(Value::Array(rows)) => rows.iter().collect(),
        Some(Value::Object(rows)) => rows.values().collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn parse_quote(body: &Value, symbol: &Symbol) -> Option<Quote> {
    let data = data(body)?;
    let field = |name: &str| data.get(name).and_then(num);

    let Some(price) = field("f43") else {
        debug!(%symbol, "No last price, instrument suspended or unknown");
        return None;
    };
    Some(Quote {
        name: data.get("f58").and_then(text).map(str::to_string),
        high: field("f44"),
        low: field("f45"),
        open: field("f46"),
        volume: field("f47").map(|v| v * SHARES_PER_LOT),
        amount: field("f48"),
        prev_close: field("f60"),
        pe: field("f162"),
        pb: field("f167"),
        market_cap: field("f116"),
        timestamp: data
            .get("f86")
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        ..Quote::new(symbol.clone(), price)
    })
}

pub(crate) fn parse_boards(body: &Value) -> Vec<Industry> {
    diff_rows(body)
        .into_iter()
        .filter_map(|row| {
            let name = row.get("f14").and_then(text)?;
            let industry = Industry::new(name);
            Some(match row.get("f12").and_then(text) {
                Some(code) => industry.with_code(code),
                None => industry,
            })
        })
        .collect()
}

/// Boards with `f9` (PE), `f23` (PB) and `f20` (total market value, CNY).
pub(crate) fn parse_board_valuations(body: &Value) -> Vec<Industry> {
    diff_rows(body)
        .into_iter()
        .filter_map(|row| {
            let name = row.get("f14").and_then(text)?;
            let field = |key: &str| row.get(key).and_then(num);
            let mut industry =
                Industry::new(name).with_valuation(field("f9"), field("f23"), field("f20"));
            if let Some(code) = row.get("f12").and_then(text) {
                industry = industry.with_code(code);
            }
            Some(industry)
        })
        .collect()
}

pub(crate) fn parse_board_members(body: &Value) -> Vec<IndustryMember> {
    diff_rows(body)
        .into_iter()
        .filter_map(|row| {
            let code = row.get("f12").and_then(text)?;
            let market = row.get("f13").and_then(Value::as_i64)?;
            let symbol = SymbolScheme::MarketId
                .decode(&format!("{market}.{code}"))
                .ok()?;
            let name = row.get("f14").and_then(text)?.to_string();
            Some(IndustryMember { symbol, name })
        })
        .collect()
}

/// Parses `date,open,close,high,low,volume,amount` kline strings.
pub(crate) fn parse_klines(body: &Value, intraday: bool) -> Result<Vec<OhlcvBar>> {
    let Some(klines) = data(body).and_then(|d| d.get("klines")) else {
        return Ok(Vec::new());
    };
    let Some(klines) = klines.as_array() else {
        return Err(DataError::malformed(PROVIDER_NAME, "klines is not an array"));
    };

    let mut bars = klines
        .iter()
        .filter_map(Value::as_str)
        .map(|line| parse_kline(line, intraday))
        .collect::<Result<Vec<_>>>()?;
    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

fn parse_kline(line: &str, intraday: bool) -> Result<OhlcvBar> {
    let bad = || DataError::malformed(PROVIDER_NAME, format!("bad kline: {line}"));
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 7 {
        return Err(bad());
    }
    let number = |i: usize| fields[i].trim().parse::<f64>().map_err(|_| bad());

    let timestamp = if intraday {
        NaiveDateTime::parse_from_str(fields[0], "%Y-%m-%d %H:%M")
            .ok()
            .and_then(local_to_utc)
    } else {
        NaiveDate::parse_from_str(fields[0], "%Y-%m-%d")
            .ok()
            .and_then(session_close)
    }
    .ok_or_else(bad)?;

    let bar = OhlcvBar::new(
        timestamp,
        number(1)?,
        number(3)?,
        number(4)?,
        number(2)?,
        number(5)? * SHARES_PER_LOT,
    );
    Ok(bar.with_amount(number(6)?))
}
