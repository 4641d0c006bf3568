//! In-memory cache implementation.

use async_trait::async_trait;
use feed_core::{CacheKey, Record, RecordCache, Result};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, instrument};

/// Default time-to-live for cached records.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default upper bound on stored entries.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Cache entry with timestamp for TTL-based invalidation.
#[derive(Debug, Clone)]
struct CacheEntry {
    record: Record,
    stored_at: Instant,
}

impl CacheEntry {
    fn new(record: Record) -> Self {
        Self {
            record,
            stored_at: Instant::now(),
        }
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() >= ttl
    }
}

/// Bounded in-memory record cache with TTL expiry.
///
/// Entries older than the TTL read as misses and are dropped on access. When
/// the cache is full, `put` first sweeps expired entries and then evicts the
/// oldest one. Records are cloned on get/put.
#[derive(Debug)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl InMemoryCache {
    /// Create a new empty in-memory cache with default TTL and size.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time-to-live.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the maximum number of entries. Zero is treated as one.
    #[must_use]
    pub const fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = if max_entries == 0 { 1 } else { max_entries };
        self
    }

    /// Configured time-to-live.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[async_trait]
impl RecordCache for InMemoryCache {
    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &CacheKey) -> Result<Option<Record>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_stale(self.ttl) => {
                    debug!("Cache hit");
                    return Ok(Some(entry.record.clone()));
                }
                Some(_) => {}
                None => {
                    debug!("Cache miss");
                    return Ok(None);
                }
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.is_stale(self.ttl)) {
            entries.remove(key);
            debug!("Cache entry expired");
        }
        Ok(None)
    }

    #[instrument(skip(self, record), fields(key = %key))]
    async fn put(&self, key: CacheKey, record: Record) -> Result<()> {
        let mut entries = self.entries.write().await;

        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let ttl = self.ttl;
            entries.retain(|_, entry| !entry.is_stale(ttl));

            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.stored_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    debug!(evicted = %oldest, "Cache full, evicting oldest entry");
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(key, CacheEntry::new(record));
        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate_stale(&self) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, entry| !entry.is_stale(ttl));
        let removed = before - entries.len();

        if removed > 0 {
            debug!("Invalidated {} stale cache entries", removed);
        }

        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        debug!("Cleared all cache entries");
        Ok(())
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_core::{Quote, Request, Symbol};

    fn quote_entry(code: &str, price: f64) -> (CacheKey, Record) {
        let symbol = Symbol::parse(code).unwrap();
        let key = Request::Quote {
            symbol: symbol.clone(),
        }
        .cache_key();
        (key, Record::Quote(Quote::new(symbol, price)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl() {
        let cache = InMemoryCache::new();
        let (key, record) = quote_entry("600000.SH", 7.3);

        assert!(cache.get(&key).await.unwrap().is_none());
        cache.put(key.clone(), record.clone()).await.unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get(&key).await.unwrap(), Some(record));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_a_miss_and_removed() {
        let cache = InMemoryCache::new().with_ttl(Duration::from_secs(60));
        let (key, record) = quote_entry("600000.SH", 7.3);
        cache.put(key.clone(), record).await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(cache.get(&key).await.unwrap().is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacing_entry_restarts_ttl() {
        let cache = InMemoryCache::new().with_ttl(Duration::from_secs(60));
        let (key, first) = quote_entry("600000.SH", 7.3);
        let (_, second) = quote_entry("600000.SH", 7.4);

        cache.put(key.clone(), first).await.unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;
        cache.put(key.clone(), second.clone()).await.unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;

        assert_eq!(cache.get(&key).await.unwrap(), Some(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cache_evicts_oldest() {
        let cache = InMemoryCache::new().with_max_entries(2);
        let (k1, r1) = quote_entry("600000.SH", 7.3);
        let (k2, r2) = quote_entry("000001.SZ", 10.1);
        let (k3, r3) = quote_entry("600519.SH", 1500.0);

        cache.put(k1.clone(), r1).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.put(k2.clone(), r2).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.put(k3.clone(), r3).await.unwrap();

        assert_eq!(cache.len().await, 2);
        assert!(cache.get(&k1).await.unwrap().is_none());
        assert!(cache.get(&k2).await.unwrap().is_some());
        assert!(cache.get(&k3).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cache_prefers_sweeping_expired() {
        let cache = InMemoryCache::new()
            .with_ttl(Duration::from_secs(10))
            .with_max_entries(2);
        let (k1, r1) = quote_entry("600000.SH", 7.3);
        let (k2, r2) = quote_entry("000001.SZ", 10.1);
        let (k3, r3) = quote_entry("600519.SH", 1500.0);

        cache.put(k1, r1).await.unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;
        cache.put(k2.clone(), r2).await.unwrap();
        cache.put(k3.clone(), r3).await.unwrap();

        assert!(cache.get(&k2).await.unwrap().is_some());
        assert!(cache.get(&k3).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_stale() {
        let cache = InMemoryCache::new().with_ttl(Duration::from_secs(30));
        let (k1, r1) = quote_entry("600000.SH", 7.3);
        let (k2, r2) = quote_entry("000001.SZ", 10.1);

        cache.put(k1, r1).await.unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;
        cache.put(k2, r2).await.unwrap();
        tokio::time::advance(Duration::from_secs(15)).await;

        assert_eq!(cache.invalidate_stale().await.unwrap(), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = InMemoryCache::new();
        let (key, record) = quote_entry("600000.SH", 7.3);
        cache.put(key.clone(), record).await.unwrap();

        cache.clear().await.unwrap();

        assert!(cache.get(&key).await.unwrap().is_none());
        assert!(cache.is_empty().await);
    }
}
