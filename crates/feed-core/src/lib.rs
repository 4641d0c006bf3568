#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/feed/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for multi-provider A-share market data.
//!
//! This crate provides the foundational abstractions shared by every provider:
//!
//! - [`DataProvider`](provider::DataProvider) - Adapter contract
//! - [`Request`](request::Request) / [`Record`](request::Record) - Canonical query and answer
//! - [`SymbolNormalizer`](symbol::SymbolNormalizer) - Per-provider symbol dialects
//! - [`Retrier`](retry::Retrier) - Exponential backoff with jitter
//! - [`SessionManager`](session::SessionManager) - Single-flight login
//! - [`RecordCache`](cache::RecordCache) - Caching abstraction

/// Cache trait for storing resolved records.
pub mod cache;
/// Error types for data operations.
pub mod error;
/// DataFrame export helpers.
pub mod frame;
/// Bar frequency and period type definitions.
pub mod frequency;
/// Provider trait for fetching market data.
pub mod provider;
/// Canonical requests, records and operations.
pub mod request;
/// Retry with exponential backoff.
pub mod retry;
/// Session lifecycle for stateful providers.
pub mod session;
/// Canonical symbols and provider encodings.
pub mod symbol;
/// Mainland market clock helpers.
pub mod time;
/// Canonical record types (Quote, OHLCV, company, financials).
pub mod types;

// Re-export commonly used items at crate root
pub use cache::RecordCache;
pub use error::{DataError, FailureRecord, Result};
pub use frame::bars_to_dataframe;
pub use frequency::{DataFrequency, PeriodType};
pub use provider::DataProvider;
pub use request::{CacheKey, Operation, Record, RecordPolicy, Request, is_empty_record};
pub use retry::{Retrier, RetryClass, RetryPolicy, with_retry};
pub use session::{Authenticator, Session, SessionManager, SessionState};
pub use symbol::{Exchange, Symbol, SymbolNormalizer, SymbolScheme};
pub use types::{CompanyInfo, FinancialStatement, Industry, IndustryMember, OhlcvBar, Quote};
