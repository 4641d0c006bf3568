//! Cache trait for storing resolved records.
//!
//! This module defines the [`RecordCache`] trait. Keys are provider
//! independent, so a record cached from one provider serves the next identical
//! request whichever provider would have answered it.

use async_trait::async_trait;

use crate::{
    error::Result,
    request::{CacheKey, Record},
};

/// Trait for caching resolved records.
#[async_trait]
pub trait RecordCache: Send + Sync {
    /// Retrieves a fresh record.
    ///
    /// Returns `Ok(Some(record))` if a non-expired entry exists, `Ok(None)` otherwise.
    async fn get(&self, key: &CacheKey) -> Result<Option<Record>>;

    /// Stores a record, replacing any existing entry for `key`.
    async fn put(&self, key: CacheKey, record: Record) -> Result<()>;

    /// Removes expired entries.
    ///
    /// Returns the number of entries invalidated.
    async fn invalidate_stale(&self) -> Result<usize>;

    /// Clears all cached data.
    async fn clear(&self) -> Result<()>;

    /// Number of stored entries, expired ones included until swept.
    async fn len(&self) -> usize;

    /// Returns true if nothing is stored.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
