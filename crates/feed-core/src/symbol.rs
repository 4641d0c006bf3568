//! Canonical A-share symbols and the per-provider encodings.
//!
//! Every request and record carries a canonical [`Symbol`] (`600000.SH`).
//! Providers address the same instrument differently; a [`SymbolScheme`]
//! encodes and decodes one of those dialects, and the [`SymbolNormalizer`]
//! maps provider names to their scheme.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{DataError, Result};

/// Listing exchange of a mainland A-share.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Exchange {
    /// Shanghai Stock Exchange.
    Shanghai,
    /// Shenzhen Stock Exchange.
    Shenzhen,
}

impl Exchange {
    /// Canonical two-letter suffix (`SH` / `SZ`).
    #[must_use]
    pub const fn suffix(&self) -> &'static str {
        match self {
            Self::Shanghai => "SH",
            Self::Shenzhen => "SZ",
        }
    }

    /// Lowercase prefix used by Sina and BaoStock (`sh` / `sz`).
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Shanghai => "sh",
            Self::Shenzhen => "sz",
        }
    }

    /// East Money market id (`1` for Shanghai, `0` for Shenzhen).
    #[must_use]
    pub const fn market_id(&self) -> u8 {
        match self {
            Self::Shanghai => 1,
            Self::Shenzhen => 0,
        }
    }

    fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "SH" => Some(Self::Shanghai),
            "SZ" => Some(Self::Shenzhen),
            _ => None,
        }
    }

    fn from_prefix(s: &str) -> Option<Self> {
        match s {
            "sh" => Some(Self::Shanghai),
            "sz" => Some(Self::Shenzhen),
            _ => None,
        }
    }

    fn from_market_id(s: &str) -> Option<Self> {
        match s {
            "1" => Some(Self::Shanghai),
            "0" => Some(Self::Shenzhen),
            _ => None,
        }
    }
}

/// A canonical A-share symbol: six digits plus exchange, rendered `600000.SH`.
///
/// Construction validates the code, so a `Symbol` is always well formed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol {
    code: String,
    exchange: Exchange,
}

impl Symbol {
    /// Creates a symbol from a six-digit code and an exchange.
    pub fn new(code: &str, exchange: Exchange) -> Result<Self> {
        if !is_six_digits(code) {
            return Err(DataError::UnrecognizedSymbolFormat(code.to_string()));
        }
        Ok(Self {
            code: code.to_string(),
            exchange,
        })
    }

    /// Parses the canonical `CODE.SH` / `CODE.SZ` form.
    ///
    /// Surrounding whitespace is ignored and the suffix is case-insensitive.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let Some((code, suffix)) = trimmed.split_once('.') else {
            return Err(DataError::UnrecognizedSymbolFormat(s.to_string()));
        };
        let exchange = Exchange::from_suffix(&suffix.to_ascii_uppercase())
            .ok_or_else(|| DataError::UnrecognizedSymbolFormat(s.to_string()))?;
        Self::new(code, exchange).map_err(|_| DataError::UnrecognizedSymbolFormat(s.to_string()))
    }

    /// The six-digit exchange code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The listing exchange.
    #[must_use]
    pub const fn exchange(&self) -> Exchange {
        self.exchange
    }

    /// Shanghai Composite, Shenzhen Component and ChiNext, in that order.
    #[must_use]
    pub fn main_indices() -> Vec<Self> {
        [
            ("000001", Exchange::Shanghai),
            ("399001", Exchange::Shenzhen),
            ("399006", Exchange::Shenzhen),
        ]
        .into_iter()
        .map(|(code, exchange)| Self {
            code: code.to_string(),
            exchange,
        })
        .collect()
    }
}

fn is_six_digits(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.code, self.exchange.suffix())
    }
}

impl FromStr for Symbol {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = DataError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.to_string()
    }
}

/// One provider's symbol dialect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolScheme {
    /// `600000.SH` (Tushare).
    Canonical,
    /// `sh600000` (Sina).
    LowerPrefix,
    /// `sh.600000` (BaoStock).
    DottedPrefix,
    /// `1.600000` / `0.000001` (East Money `secid`).
    MarketId,
}

impl SymbolScheme {
    /// Renders a canonical symbol in this dialect.
    #[must_use]
    pub fn encode(&self, symbol: &Symbol) -> String {
        let exchange = symbol.exchange();
        match self {
            Self::Canonical => symbol.to_string(),
            Self::LowerPrefix => format!("{}{}", exchange.prefix(), symbol.code()),
            Self::DottedPrefix => format!("{}.{}", exchange.prefix(), symbol.code()),
            Self::MarketId => format!("{}.{}", exchange.market_id(), symbol.code()),
        }
    }

    /// Parses a code in this dialect back into a canonical symbol.
    pub fn decode(&self, raw: &str) -> Result<Symbol> {
        let unrecognized = || DataError::UnrecognizedSymbolFormat(raw.to_string());
        let trimmed = raw.trim();
        match self {
            Self::Canonical => Symbol::parse(trimmed),
            Self::LowerPrefix => {
                let lower = trimmed.to_ascii_lowercase();
                let (prefix, code) = lower.split_at_checked(2).ok_or_else(unrecognized)?;
                let exchange = Exchange::from_prefix(prefix).ok_or_else(unrecognized)?;
                Symbol::new(code, exchange).map_err(|_| unrecognized())
            }
            Self::DottedPrefix => {
                let lower = trimmed.to_ascii_lowercase();
                let (prefix, code) = lower.split_once('.').ok_or_else(unrecognized)?;
                let exchange = Exchange::from_prefix(prefix).ok_or_else(unrecognized)?;
                Symbol::new(code, exchange).map_err(|_| unrecognized())
            }
            Self::MarketId => {
                let (market, code) = trimmed.split_once('.').ok_or_else(unrecognized)?;
                let exchange = Exchange::from_market_id(market).ok_or_else(unrecognized)?;
                Symbol::new(code, exchange).map_err(|_| unrecognized())
            }
        }
    }
}

/// Maps provider names to their [`SymbolScheme`].
#[derive(Clone, Debug, Default)]
pub struct SymbolNormalizer {
    schemes: HashMap<String, SymbolScheme>,
}

impl SymbolNormalizer {
    /// Creates an empty normalizer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizer preloaded with the four built-in providers.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with_scheme("tushare", SymbolScheme::Canonical)
            .with_scheme("eastmoney", SymbolScheme::MarketId)
            .with_scheme("sina", SymbolScheme::LowerPrefix)
            .with_scheme("baostock", SymbolScheme::DottedPrefix)
    }

    /// Registers (or replaces) the scheme for a provider.
    pub fn register(&mut self, provider: impl Into<String>, scheme: SymbolScheme) {
        self.schemes.insert(provider.into(), scheme);
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with_scheme(mut self, provider: impl Into<String>, scheme: SymbolScheme) -> Self {
        self.register(provider, scheme);
        self
    }

    /// Scheme registered for `provider`.
    pub fn scheme(&self, provider: &str) -> Result<SymbolScheme> {
        self.schemes
            .get(provider)
            .copied()
            .ok_or_else(|| DataError::ProviderNotConfigured(provider.to_string()))
    }

    /// Encodes a canonical symbol for `provider`.
    pub fn to_provider_format(&self, symbol: &Symbol, provider: &str) -> Result<String> {
        Ok(self.scheme(provider)?.encode(symbol))
    }

    /// Decodes a provider-native code into a canonical symbol.
    pub fn to_canonical_format(&self, code: &str, provider: &str) -> Result<Symbol> {
        self.scheme(provider)?.decode(code)
    }
}
