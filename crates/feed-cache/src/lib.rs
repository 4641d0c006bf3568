#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/feed/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Caching implementations for feed providers.
//!
//! This crate provides implementations of the [`RecordCache`] trait from `feed-core`:
//!
//! - [`InMemoryCache`] - Bounded in-memory cache with TTL expiry
//! - [`NoopCache`] - No-op cache that doesn't store anything

/// In-memory cache implementation.
pub mod memory;
/// No-op cache implementation.
pub mod noop;

// Re-export the trait for convenience
pub use feed_core::RecordCache;

// Re-export implementations
pub use memory::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL, InMemoryCache};
pub use noop::NoopCache;
