//! No-op cache implementation.

use async_trait::async_trait;
use feed_core::{CacheKey, Record, RecordCache, Result};
use tracing::trace;

/// A no-op cache that doesn't store anything.
///
/// `get` always misses and `put` discards the record, so every request reaches
/// a provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl NoopCache {
    /// Create a new no-op cache.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RecordCache for NoopCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Record>> {
        trace!(key = %key, "NoopCache: get called, returning None");
        Ok(None)
    }

    async fn put(&self, key: CacheKey, _record: Record) -> Result<()> {
        trace!(key = %key, "NoopCache: put called, doing nothing");
        Ok(())
    }

    async fn invalidate_stale(&self) -> Result<usize> {
        Ok(0)
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }

    async fn len(&self) -> usize {
        0
    }
}
