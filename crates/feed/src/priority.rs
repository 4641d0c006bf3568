//! Per-operation provider order.

use std::collections::HashMap;

use feed_core::Operation;
use serde::Deserialize;

/// Which providers to try, in order, for each operation.
///
/// Operations without an entry fall back to registration order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ProviderPriority {
    orders: HashMap<Operation, Vec<String>>,
}

impl ProviderPriority {
    /// No configured orders; every operation uses registration order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders for the four built-in providers.
    ///
    /// Sina and Tushare both answer batch quotes natively, and East Money
    /// keeps the freshest board membership. Index snapshots come from Sina
    /// in one call before East Money's per-index quotes.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with(
                Operation::Quote,
                &["tushare", "eastmoney", "sina", "baostock"],
            )
            .with(Operation::BatchQuote, &["sina", "tushare"])
            .with(
                Operation::HistoricalBars,
                &["tushare", "baostock", "eastmoney"],
            )
            .with(
                Operation::IndustryList,
                &["tushare", "eastmoney", "baostock"],
            )
            .with(Operation::IndustryStocks, &["eastmoney", "tushare"])
            .with(Operation::CompanyInfo, &["tushare", "baostock"])
            .with(Operation::Financials, &["tushare", "baostock"])
            .with(Operation::IndustryValuations, &["tushare", "eastmoney"])
            .with(Operation::MarketIndex, &["sina", "eastmoney"])
    }

    /// Sets the order for one operation.
    pub fn set(&mut self, operation: Operation, providers: &[&str]) {
        self.orders.insert(
            operation,
            providers.iter().map(|p| (*p).to_string()).collect(),
        );
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, operation: Operation, providers: &[&str]) -> Self {
        self.set(operation, providers);
        self
    }

    /// Configured order for `operation`, if any.
    #[must_use]
    pub fn order(&self, operation: Operation) -> Option<&[String]> {
        self.orders.get(&operation).map(Vec::as_slice)
    }
}
