//! Canonical requests and records.
//!
//! A [`Request`] names one [`Operation`] plus its typed parameters. Whatever
//! provider answers it, the answer is a [`Record`] of the same shape.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DataError, Result};
use crate::frequency::DataFrequency;
use crate::symbol::Symbol;
use crate::types::{
    CompanyInfo, FinancialStatement, Industry, IndustryMember, OhlcvBar, Quote,
};

/// Kind of query a provider can answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Realtime quote for one symbol.
    Quote,
    /// Realtime quotes for several symbols in one call.
    BatchQuote,
    /// Historical OHLCV bars.
    HistoricalBars,
    /// Industry classification list.
    IndustryList,
    /// Constituents of one industry.
    IndustryStocks,
    /// Company reference data.
    CompanyInfo,
    /// Financial statement for one fiscal quarter.
    Financials,
    /// Valuation figures aggregated per industry.
    IndustryValuations,
    /// Snapshot of the main market indices.
    MarketIndex,
}

impl Operation {
    /// Every operation, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Quote,
        Self::BatchQuote,
        Self::HistoricalBars,
        Self::IndustryList,
        Self::IndustryStocks,
        Self::CompanyInfo,
        Self::Financials,
        Self::IndustryValuations,
        Self::MarketIndex,
    ];

    /// Stable snake-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::BatchQuote => "batch_quote",
            Self::HistoricalBars => "historical_bars",
            Self::IndustryList => "industry_list",
            Self::IndustryStocks => "industry_stocks",
            Self::CompanyInfo => "company_info",
            Self::Financials => "financials",
            Self::IndustryValuations => "industry_valuations",
            Self::MarketIndex => "market_index",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s.trim())
            .ok_or_else(|| DataError::InvalidParameter(format!("unknown operation: {s}")))
    }
}

/// A canonical query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Request {
    /// Realtime quote.
    Quote {
        /// Instrument.
        symbol: Symbol,
    },
    /// Realtime quotes for several instruments.
    BatchQuote {
        /// Instruments; order and duplicates do not matter.
        symbols: Vec<Symbol>,
    },
    /// Historical bars over an inclusive date range.
    HistoricalBars {
        /// Instrument.
        symbol: Symbol,
        /// First day.
        start: NaiveDate,
        /// Last day.
        end: NaiveDate,
        /// Bar size.
        frequency: DataFrequency,
    },
    /// Industry classification list.
    IndustryList,
    /// Constituents of an industry.
    IndustryStocks {
        /// Industry name or provider board code.
        industry: String,
    },
    /// Company reference data.
    CompanyInfo {
        /// Instrument.
        symbol: Symbol,
    },
    /// Financial statement for one fiscal quarter.
    Financials {
        /// Instrument.
        symbol: Symbol,
        /// Fiscal year.
        year: i32,
        /// Fiscal quarter, 1-4.
        quarter: u8,
    },
    /// PE, PB and market capitalisation per industry.
    IndustryValuations,
    /// Quotes of the Shanghai Composite, Shenzhen Component and ChiNext indices.
    MarketIndex,
}

impl Request {
    /// The operation this request asks for.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Quote { .. } => Operation::Quote,
            Self::BatchQuote { .. } => Operation::BatchQuote,
            Self::HistoricalBars { .. } => Operation::HistoricalBars,
            Self::IndustryList => Operation::IndustryList,
            Self::IndustryStocks { .. } => Operation::IndustryStocks,
            Self::CompanyInfo { .. } => Operation::CompanyInfo,
            Self::Financials { .. } => Operation::Financials,
            Self::IndustryValuations => Operation::IndustryValuations,
            Self::MarketIndex => Operation::MarketIndex,
        }
    }

    /// Rejects parameter combinations no provider could answer.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::BatchQuote { symbols } if symbols.is_empty() => Err(
                DataError::InvalidParameter("batch quote needs at least one symbol".to_string()),
            ),
            Self::HistoricalBars { start, end, .. } if start > end => {
                Err(DataError::InvalidParameter(format!(
                    "Start date {start} is after end date {end}"
                )))
            }
            Self::IndustryStocks { industry } if industry.trim().is_empty() => Err(
                DataError::InvalidParameter("industry name is empty".to_string()),
            ),
            Self::Financials { quarter, .. } if !(1..=4).contains(quarter) => Err(
                DataError::InvalidParameter(format!("quarter {quarter} is not in 1-4")),
            ),
            _ => Ok(()),
        }
    }

    /// Provider-independent cache key.
    ///
    /// Batch symbols are sorted and deduplicated so equivalent requests share
    /// one entry.
    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        let op = self.operation();
        let key = match self {
            Self::Quote { symbol } | Self::CompanyInfo { symbol } => format!("{op}:{symbol}"),
            Self::BatchQuote { symbols } => {
                let mut sorted: Vec<&Symbol> = symbols.iter().collect();
                sorted.sort();
                sorted.dedup();
                let joined = sorted
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{op}:{joined}")
            }
            Self::HistoricalBars {
                symbol,
                start,
                end,
                frequency,
            } => format!("{op}:{symbol}:{start}:{end}:{frequency}"),
            Self::IndustryList | Self::IndustryValuations | Self::MarketIndex => op.to_string(),
            Self::IndustryStocks { industry } => format!("{op}:{}", industry.trim()),
            Self::Financials {
                symbol,
                year,
                quarter,
            } => format!("{op}:{symbol}:{year}Q{quarter}"),
        };
        CacheKey(key)
    }
}

/// Cache key derived from a [`Request`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A canonical answer. Same shape whichever provider produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Record {
    /// Answer to [`Operation::Quote`].
    Quote(Quote),
    /// Answer to [`Operation::BatchQuote`].
    Quotes(Vec<Quote>),
    /// Answer to [`Operation::HistoricalBars`].
    Bars(Vec<OhlcvBar>),
    /// Answer to [`Operation::IndustryList`].
    Industries(Vec<Industry>),
    /// Answer to [`Operation::IndustryStocks`].
    Constituents(Vec<IndustryMember>),
    /// Answer to [`Operation::CompanyInfo`].
    Company(CompanyInfo),
    /// Answer to [`Operation::Financials`].
    Financials(FinancialStatement),
    /// Answer to [`Operation::IndustryValuations`].
    Valuations(Vec<Industry>),
    /// Answer to [`Operation::MarketIndex`].
    Indices(Vec<Quote>),
}

impl Record {
    /// The operation this record answers.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Quote(_) => Operation::Quote,
            Self::Quotes(_) => Operation::BatchQuote,
            Self::Bars(_) => Operation::HistoricalBars,
            Self::Industries(_) => Operation::IndustryList,
            Self::Constituents(_) => Operation::IndustryStocks,
            Self::Company(_) => Operation::CompanyInfo,
            Self::Financials(_) => Operation::Financials,
            Self::Valuations(_) => Operation::IndustryValuations,
            Self::Indices(_) => Operation::MarketIndex,
        }
    }

    /// True when the record carries data but some expected fields are missing.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        match self {
            Self::Quote(q) => q.is_partial(),
            Self::Quotes(qs) | Self::Indices(qs) => qs.iter().any(Quote::is_partial),
            _ => false,
        }
    }

    /// Unwraps a [`Record::Quote`].
    #[must_use]
    pub fn into_quote(self) -> Option<Quote> {
        match self {
            Self::Quote(q) => Some(q),
            _ => None,
        }
    }

    /// Unwraps a [`Record::Quotes`].
    #[must_use]
    pub fn into_quotes(self) -> Option<Vec<Quote>> {
        match self {
            Self::Quotes(qs) => Some(qs),
            _ => None,
        }
    }

    /// Unwraps a [`Record::Bars`].
    #[must_use]
    pub fn into_bars(self) -> Option<Vec<OhlcvBar>> {
        match self {
            Self::Bars(bars) => Some(bars),
            _ => None,
        }
    }

    /// Unwraps a [`Record::Industries`].
    #[must_use]
    pub fn into_industries(self) -> Option<Vec<Industry>> {
        match self {
            Self::Industries(list) => Some(list),
            _ => None,
        }
    }

    /// Unwraps a [`Record::Constituents`].
    #[must_use]
    pub fn into_constituents(self) -> Option<Vec<IndustryMember>> {
        match self {
            Self::Constituents(members) => Some(members),
            _ => None,
        }
    }

    /// Unwraps a [`Record::Company`].
    #[must_use]
    pub fn into_company(self) -> Option<CompanyInfo> {
        match self {
            Self::Company(info) => Some(info),
            _ => None,
        }
    }

    /// Unwraps a [`Record::Financials`].
    #[must_use]
    pub fn into_financials(self) -> Option<FinancialStatement> {
        match self {
            Self::Financials(statement) => Some(statement),
            _ => None,
        }
    }

    /// Unwraps a [`Record::Valuations`].
    #[must_use]
    pub fn into_valuations(self) -> Option<Vec<Industry>> {
        match self {
            Self::Valuations(list) => Some(list),
            _ => None,
        }
    }

    /// Unwraps a [`Record::Indices`].
    #[must_use]
    pub fn into_indices(self) -> Option<Vec<Quote>> {
        match self {
            Self::Indices(quotes) => Some(quotes),
            _ => None,
        }
    }
}

/// Whether a record counts as "no data".
///
/// Empty collections, quotes without a positive price, company info without a
/// name and statements with no figures are all empty. A valuation list where
/// no industry carries a figure is empty too. The orchestrator treats
/// an empty record exactly like a failed call.
#[must_use]
pub fn is_empty_record(record: &Record) -> bool {
    match record {
        Record::Quote(q) => !q.has_price(),
        Record::Quotes(qs) | Record::Indices(qs) => !qs.iter().any(Quote::has_price),
        Record::Bars(bars) => bars.is_empty(),
        Record::Industries(list) => list.is_empty(),
        Record::Constituents(members) => members.is_empty(),
        Record::Company(info) => info.name.trim().is_empty(),
        Record::Financials(statement) => statement.is_blank(),
        Record::Valuations(list) => !list.iter().any(Industry::has_valuation),
    }
}

/// What to do with a record that has data but is missing fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordPolicy {
    /// Return partial records as they are.
    #[default]
    AcceptPartial,
    /// Treat partial records as a provider failure and keep falling back.
    RejectPartial,
}

impl RecordPolicy {
    /// Returns true if `record` passes this policy.
    #[must_use]
    pub fn accepts(&self, record: &Record) -> bool {
        match self {
            Self::AcceptPartial => true,
            Self::RejectPartial => !record.is_partial(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    #[test]
    fn test_operation_names() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
        assert!("dupont".parse::<Operation>().is_err());
    }

    #[test]
    fn test_batch_cache_key_is_order_independent() {
        let a = Request::BatchQuote {
            symbols: vec![sym("600000.SH"), sym("000001.SZ"), sym("600000.SH")],
        };
        let b = Request::BatchQuote {
            symbols: vec![sym("000001.SZ"), sym("600000.SH")],
        };
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_cache_key_distinguishes_params() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let daily = Request::HistoricalBars {
            symbol: sym("600000.SH"),
            start,
            end,
            frequency: DataFrequency::Daily,
        };
        let weekly = Request::HistoricalBars {
            symbol: sym("600000.SH"),
            start,
            end,
            frequency: DataFrequency::Weekly,
        };
        assert_ne!(daily.cache_key(), weekly.cache_key());
        assert_eq!(
            daily.cache_key().as_str(),
            "historical_bars:600000.SH:2024-01-01:2024-03-31:daily"
        );
    }

    #[test]
    fn test_validate() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let inverted = Request::HistoricalBars {
            symbol: sym("600000.SH"),
            start,
            end,
            frequency: DataFrequency::Daily,
        };
        assert!(matches!(
            inverted.validate(),
            Err(DataError::InvalidParameter(_))
        ));
        assert!(Request::BatchQuote { symbols: vec![] }.validate().is_err());
        assert!(
            Request::Financials {
                symbol: sym("600000.SH"),
                year: 2023,
                quarter: 5
            }
            .validate()
            .is_err()
        );
        assert!(Request::IndustryList.validate().is_ok());
    }

    #[test]
    fn test_empty_records() {
        assert!(is_empty_record(&Record::Bars(vec![])));
        assert!(is_empty_record(&Record::Quote(Quote::new(sym("600000.SH"), 0.0))));
        assert!(!is_empty_record(&Record::Quote(Quote::new(sym("600000.SH"), 7.2))));
        assert!(is_empty_record(&Record::Company(CompanyInfo::new(
            sym("600000.SH"),
            "  "
        ))));
    }

    #[test]
    fn test_valuation_records() {
        let names_only = Record::Valuations(vec![Industry::new("银行"), Industry::new("电力")]);
        assert!(is_empty_record(&names_only));

        let valued = Record::Valuations(vec![
            Industry::new("银行"),
            Industry::new("电力").with_valuation(Some(18.4), None, None),
        ]);
        assert!(!is_empty_record(&valued));
        assert_eq!(valued.operation(), Operation::IndustryValuations);
        assert_eq!(Request::IndustryValuations.cache_key().as_str(), "industry_valuations");
    }

    #[test]
    fn test_index_records() {
        let flat = Record::Indices(vec![Quote::new(sym("000001.SH"), 0.0)]);
        assert!(is_empty_record(&flat));

        let live = Record::Indices(vec![
            Quote::new(sym("000001.SH"), 3_050.2),
            Quote::new(sym("399001.SZ"), 0.0),
        ]);
        assert!(!is_empty_record(&live));
        assert!(live.is_partial());
        assert_eq!(live.operation(), Operation::MarketIndex);
        assert_eq!(live.into_indices().map(|qs| qs.len()), Some(2));
        assert_eq!(Request::MarketIndex.cache_key().as_str(), "market_index");
    }

    #[test]
    fn test_partial_policy() {
        let partial = Record::Quote(Quote::new(sym("600000.SH"), 7.2));
        let mut full_quote = Quote::new(sym("600000.SH"), 7.2);
        full_quote.volume = Some(1_000.0);
        let full = Record::Quote(full_quote);

        assert!(RecordPolicy::AcceptPartial.accepts(&partial));
        assert!(!RecordPolicy::RejectPartial.accepts(&partial));
        assert!(RecordPolicy::RejectPartial.accepts(&full));
    }

    #[test]
    fn test_request_serde_tagging() {
        let request: Request =
            serde_json::from_str(r#"{"operation":"quote","symbol":"600000.SH"}"#).unwrap();
        assert_eq!(request.operation(), Operation::Quote);

        let request: Request =
            serde_json::from_str(r#"{"operation":"market_index"}"#).unwrap();
        assert_eq!(request, Request::MarketIndex);
    }
}
