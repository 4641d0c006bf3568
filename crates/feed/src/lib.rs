#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/feed/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Unified A-share market data interface.
//!
//! This crate re-exports the core types and provider implementations and
//! provides a [`DataProviderRegistry`] that resolves canonical requests across
//! several providers with caching, retry and automatic fallback.
//!
//! # Features
//!
//! - `tushare` - Tushare Pro token API (quotes, bars, industries, valuations, fundamentals)
//! - `eastmoney` - East Money quote, index and board endpoints
//! - `sina` - Sina Finance realtime, batch and index quotes
//! - `baostock` - BaoStock session-based RPC (bars, industries, fundamentals)
//!
//! # Example
//!
//! ```rust,ignore
//! use feed::{DataFrequency, DataProviderRegistry, FeedConfig, Symbol};
//! use chrono::NaiveDate;
//!
//! #[tokio::main]
//! async fn main() -> feed::Result<()> {
//!     let registry = DataProviderRegistry::from_config(&FeedConfig::from_env()?);
//!
//!     let symbol = Symbol::parse("600000.SH")?;
//!     let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//!     let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
//!
//!     let bars = registry
//!         .historical_bars(&symbol, start, end, DataFrequency::Daily)
//!         .await?;
//!     println!("{} bars", bars.len());
//!
//!     registry.shutdown().await
//! }
//! ```

// Core types and traits
pub use feed_core::*;

// Cache implementations
pub use feed_cache::{InMemoryCache, NoopCache};

// Providers
#[cfg(feature = "baostock")]
pub use feed_baostock::BaostockProvider;
#[cfg(feature = "eastmoney")]
pub use feed_eastmoney::EastMoneyProvider;
#[cfg(feature = "sina")]
pub use feed_sina::SinaProvider;
#[cfg(feature = "tushare")]
pub use feed_tushare::TushareProvider;

mod config;
mod priority;
mod registry;

pub use config::FeedConfig;
pub use priority::ProviderPriority;
pub use registry::{DEFAULT_BATCH_WINDOW, DEFAULT_CALL_TIMEOUT, DataProviderRegistry};
