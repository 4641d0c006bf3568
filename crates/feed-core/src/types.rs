//! Canonical record types.
//!
//! This module defines the provider-independent data structures:
//!
//! - [`Quote`] - Realtime quote snapshot
//! - [`OhlcvBar`] - OHLCV price bar
//! - [`Industry`] - Industry classification entry
//! - [`IndustryMember`] - Constituent of an industry
//! - [`CompanyInfo`] - Company reference information
//! - [`FinancialStatement`] - Financial statement data

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::frequency::PeriodType;
use crate::symbol::Symbol;

/// Realtime quote snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Instrument.
    pub symbol: Symbol,
    /// Short name as listed.
    pub name: Option<String>,
    /// Last traded price.
    pub price: f64,
    /// Opening price of the session.
    pub open: Option<f64>,
    /// Session high.
    pub high: Option<f64>,
    /// Session low.
    pub low: Option<f64>,
    /// Previous session close.
    pub prev_close: Option<f64>,
    /// Traded volume in shares.
    pub volume: Option<f64>,
    /// Traded amount in CNY.
    pub amount: Option<f64>,
    /// Price to earnings ratio.
    pub pe: Option<f64>,
    /// Price to book ratio.
    pub pb: Option<f64>,
    /// Total market capitalisation in CNY.
    pub market_cap: Option<f64>,
    /// Time of the snapshot.
    pub timestamp: Option<DateTime<Utc>>,
}

impl Quote {
    /// Creates a quote with only the required fields.
    #[must_use]
    pub const fn new(symbol: Symbol, price: f64) -> Self {
        Self {
            symbol,
            name: None,
            price,
            open: None,
            high: None,
            low: None,
            prev_close: None,
            volume: None,
            amount: None,
            pe: None,
            pb: None,
            market_cap: None,
            timestamp: None,
        }
    }

    /// Absolute change from the previous close.
    #[must_use]
    pub fn change(&self) -> Option<f64> {
        self.prev_close.map(|prev| self.price - prev)
    }

    /// Percentage change from the previous close.
    #[must_use]
    pub fn change_percent(&self) -> Option<f64> {
        self.prev_close
            .filter(|prev| *prev != 0.0)
            .map(|prev| (self.price - prev) / prev * 100.0)
    }

    /// A quote with a usable price.
    #[must_use]
    pub fn has_price(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }

    /// A quote without traded volume is only partially populated.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        self.volume.is_none()
    }
}

/// OHLCV (Open, High, Low, Close, Volume) bar data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    /// Timestamp of the bar.
    pub timestamp: DateTime<Utc>,
    /// Opening price.
    pub open: f64,
    /// Highest price during the period.
    pub high: f64,
    /// Lowest price during the period.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Trading volume.
    pub volume: f64,
    /// Traded amount in CNY.
    pub amount: Option<f64>,
}

impl OhlcvBar {
    /// Creates a new OHLCV bar.
    #[must_use]
    pub const fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            amount: None,
        }
    }

    /// Sets the traded amount.
    #[must_use]
    pub const fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }
}

/// Industry classification entry.
///
/// The valuation fields are only filled by industry valuation queries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Industry {
    /// Provider-side board code, when the provider has one.
    pub code: Option<String>,
    /// Industry name.
    pub name: String,
    /// Price to earnings ratio of the industry.
    pub pe: Option<f64>,
    /// Price to book ratio of the industry.
    pub pb: Option<f64>,
    /// Combined market capitalisation in CNY.
    pub market_cap: Option<f64>,
    /// Number of listed constituents behind the figures.
    pub stock_count: Option<usize>,
}

impl Industry {
    /// Creates an industry entry.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            code: None,
            name: name.into(),
            pe: None,
            pb: None,
            market_cap: None,
            stock_count: None,
        }
    }

    /// Sets the provider-side board code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Sets the valuation figures.
    #[must_use]
    pub const fn with_valuation(
        mut self,
        pe: Option<f64>,
        pb: Option<f64>,
        market_cap: Option<f64>,
    ) -> Self {
        self.pe = pe;
        self.pb = pb;
        self.market_cap = market_cap;
        self
    }

    /// True when at least one valuation figure is present.
    #[must_use]
    pub const fn has_valuation(&self) -> bool {
        self.pe.is_some() || self.pb.is_some() || self.market_cap.is_some()
    }
}

/// Constituent of an industry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustryMember {
    /// Instrument.
    pub symbol: Symbol,
    /// Short name as listed.
    pub name: String,
}

/// Company reference information.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    /// Stock symbol.
    pub symbol: Symbol,
    /// Short name.
    pub name: String,
    /// Industry classification.
    pub industry: Option<String>,
    /// Province or region of registration.
    pub area: Option<String>,
    /// Board (main, ChiNext, STAR).
    pub market: Option<String>,
    /// Listing date.
    pub list_date: Option<NaiveDate>,
}

impl CompanyInfo {
    /// Creates new company info with required fields.
    #[must_use]
    pub fn new(symbol: Symbol, name: impl Into<String>) -> Self {
        Self {
            symbol,
            name: name.into(),
            industry: None,
            area: None,
            market: None,
            list_date: None,
        }
    }

    /// Sets the industry.
    #[must_use]
    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = Some(industry.into());
        self
    }
}

/// Financial statement figures for one reporting period.
///
/// Figures are in CNY. Providers populate whatever subset they publish.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatement {
    /// Stock symbol.
    pub symbol: Symbol,
    /// End date of the reporting period.
    pub period_end: NaiveDate,
    /// Type of period (annual or quarterly).
    pub period_type: PeriodType,
    /// Fiscal year.
    pub fiscal_year: i32,
    /// Fiscal quarter (1-4).
    pub fiscal_quarter: u8,

    // Income Statement
    /// Total revenue.
    pub revenue: Option<f64>,
    /// Operating profit.
    pub operating_income: Option<f64>,
    /// Net income attributable to shareholders.
    pub net_income: Option<f64>,
    /// Basic earnings per share.
    pub eps_basic: Option<f64>,
    /// Net profit margin, in percent.
    pub net_margin: Option<f64>,
    /// Return on equity, in percent.
    pub roe: Option<f64>,

    // Balance Sheet
    /// Total assets.
    pub total_assets: Option<f64>,
    /// Total liabilities.
    pub total_liabilities: Option<f64>,
    /// Shareholders' equity.
    pub stockholders_equity: Option<f64>,
    /// Liabilities over assets, in percent.
    pub debt_to_assets: Option<f64>,
    /// Current ratio.
    pub current_ratio: Option<f64>,

    // Cash Flow
    /// Operating cash flow.
    pub operating_cash_flow: Option<f64>,
}

impl FinancialStatement {
    /// Creates an empty statement for the given fiscal period.
    #[must_use]
    pub fn new(symbol: Symbol, period_end: NaiveDate, fiscal_year: i32, fiscal_quarter: u8) -> Self {
        Self {
            symbol,
            period_end,
            period_type: PeriodType::for_quarter(fiscal_quarter),
            fiscal_year,
            fiscal_quarter,
            revenue: None,
            operating_income: None,
            net_income: None,
            eps_basic: None,
            net_margin: None,
            roe: None,
            total_assets: None,
            total_liabilities: None,
            stockholders_equity: None,
            debt_to_assets: None,
            current_ratio: None,
            operating_cash_flow: None,
        }
    }

    /// Last calendar day of a fiscal quarter.
    #[must_use]
    pub fn quarter_end(year: i32, quarter: u8) -> Option<NaiveDate> {
        let (month, day) = match quarter {
            1 => (3, 31),
            2 => (6, 30),
            3 => (9, 30),
            4 => (12, 31),
            _ => return None,
        };
        NaiveDate::from_ymd_opt(year, month, day)
    }

    /// True when no figure at all is populated.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        [
            self.revenue,
            self.operating_income,
            self.net_income,
            self.eps_basic,
            self.net_margin,
            self.roe,
            self.total_assets,
            self.total_liabilities,
            self.stockholders_equity,
            self.debt_to_assets,
            self.current_ratio,
            self.operating_cash_flow,
        ]
        .iter()
        .all(Option::is_none)
    }

    /// Fills every unset figure from `other`.
    pub fn merge_missing(&mut self, other: &Self) {
        fn fill(slot: &mut Option<f64>, value: Option<f64>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        fill(&mut self.revenue, other.revenue);
        fill(&mut self.operating_income, other.operating_income);
        fill(&mut self.net_income, other.net_income);
        fill(&mut self.eps_basic, other.eps_basic);
        fill(&mut self.net_margin, other.net_margin);
        fill(&mut self.roe, other.roe);
        fill(&mut self.total_assets, other.total_assets);
        fill(&mut self.total_liabilities, other.total_liabilities);
        fill(&mut self.stockholders_equity, other.stockholders_equity);
        fill(&mut self.debt_to_assets, other.debt_to_assets);
        fill(&mut self.current_ratio, other.current_ratio);
        fill(&mut self.operating_cash_flow, other.operating_cash_flow);
    }
}
