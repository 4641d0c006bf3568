//! Registry configuration from the environment or a JSON document.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use feed_cache::InMemoryCache;
use feed_core::{DataError, RecordPolicy, Result, RetryPolicy};
use serde::Deserialize;

use crate::priority::ProviderPriority;

/// Settings for [`DataProviderRegistry::from_config`](crate::DataProviderRegistry::from_config).
///
/// Every field has a default, so a partial JSON document or an empty
/// environment yields a working configuration.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Tushare Pro token. Tushare is only registered when this is set.
    pub tushare_token: Option<String>,
    /// Alternative Tushare endpoint.
    pub tushare_base_url: Option<String>,
    /// Alternative BaoStock gateway.
    pub baostock_base_url: Option<String>,
    /// BaoStock account; anonymous when unset.
    pub baostock_user: Option<String>,
    /// BaoStock password.
    pub baostock_password: Option<String>,
    /// Age in seconds after which a BaoStock session is replaced by a new login.
    pub baostock_session_max_age_secs: Option<u64>,
    /// Cache time-to-live in seconds.
    pub cache_ttl_secs: u64,
    /// Maximum number of cached records.
    pub cache_capacity: usize,
    /// Timeout of a single provider attempt, in milliseconds.
    pub call_timeout_ms: u64,
    /// Concurrent single quotes per window when a batch falls back.
    pub batch_window: usize,
    /// Attempts per provider for transient failures.
    pub retry_max_attempts: u32,
    /// First backoff delay, in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Backoff ceiling, in milliseconds.
    pub retry_max_delay_ms: u64,
    /// Whether partially populated records are accepted.
    pub record_policy: RecordPolicy,
    /// Provider order per operation.
    pub priorities: ProviderPriority,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            tushare_token: None,
            tushare_base_url: None,
            baostock_base_url: None,
            baostock_user: None,
            baostock_password: None,
            baostock_session_max_age_secs: None,
            cache_ttl_secs: 300,
            cache_capacity: 10_000,
            call_timeout_ms: 30_000,
            batch_window: 10,
            retry_max_attempts: 3,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 30_000,
            record_policy: RecordPolicy::default(),
            priorities: ProviderPriority::standard(),
        }
    }
}

impl fmt::Debug for FeedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |secret: &Option<String>| secret.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("FeedConfig")
            .field("tushare_token", &redact(&self.tushare_token))
            .field("tushare_base_url", &self.tushare_base_url)
            .field("baostock_base_url", &self.baostock_base_url)
            .field("baostock_user", &self.baostock_user)
            .field("baostock_password", &redact(&self.baostock_password))
            .field(
                "baostock_session_max_age_secs",
                &self.baostock_session_max_age_secs,
            )
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("cache_capacity", &self.cache_capacity)
            .field("call_timeout_ms", &self.call_timeout_ms)
            .field("batch_window", &self.batch_window)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("record_policy", &self.record_policy)
            .finish_non_exhaustive()
    }
}

impl FeedConfig {
    /// Reads the process environment.
    ///
    /// Recognised variables: `TUSHARE_TOKEN`, `TUSHARE_BASE_URL`,
    /// `BAOSTOCK_BASE_URL`, `BAOSTOCK_USER`, `BAOSTOCK_PASSWORD`,
    /// `BAOSTOCK_SESSION_MAX_AGE_SECS`,
    /// `FEED_CACHE_TTL_SECS`, `FEED_CACHE_CAPACITY`, `FEED_CALL_TIMEOUT_MS`,
    /// `FEED_BATCH_WINDOW` and `FEED_RETRY_MAX_ATTEMPTS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from any key lookup; unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self {
            tushare_token: text("TUSHARE_TOKEN"),
            tushare_base_url: text("TUSHARE_BASE_URL"),
            baostock_base_url: text("BAOSTOCK_BASE_URL"),
            baostock_user: text("BAOSTOCK_USER"),
            baostock_password: text("BAOSTOCK_PASSWORD"),
            ..Self::default()
        };

        config.baostock_session_max_age_secs =
            parse_var(&text, "BAOSTOCK_SESSION_MAX_AGE_SECS")?;
        if let Some(ttl) = parse_var(&text, "FEED_CACHE_TTL_SECS")? {
            config.cache_ttl_secs = ttl;
        }
        if let Some(capacity) = parse_var(&text, "FEED_CACHE_CAPACITY")? {
            config.cache_capacity = capacity;
        }
        if let Some(timeout) = parse_var(&text, "FEED_CALL_TIMEOUT_MS")? {
            config.call_timeout_ms = timeout;
        }
        if let Some(window) = parse_var(&text, "FEED_BATCH_WINDOW")? {
            config.batch_window = window;
        }
        if let Some(attempts) = parse_var(&text, "FEED_RETRY_MAX_ATTEMPTS")? {
            config.retry_max_attempts = attempts;
        }
        Ok(config)
    }

    /// Parses a JSON document; missing fields keep defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DataError::Config(e.to_string()))
    }

    /// Retry policy described by the `retry_*` fields.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_max_attempts)
            .with_base_delay(Duration::from_millis(self.retry_base_delay_ms))
            .with_max_delay(Duration::from_millis(self.retry_max_delay_ms))
    }

    /// Timeout of one provider attempt.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Maximum BaoStock session age, if configured.
    #[must_use]
    pub fn baostock_session_max_age(&self) -> Option<Duration> {
        self.baostock_session_max_age_secs.map(Duration::from_secs)
    }

    /// Cache time-to-live.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// In-memory cache sized by this configuration.
    #[must_use]
    pub fn build_cache(&self) -> InMemoryCache {
        InMemoryCache::new()
            .with_ttl(self.cache_ttl())
            .with_max_entries(self.cache_capacity)
    }
}

fn parse_var<T, F>(text: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    text(key)
        .map(|raw| {
            raw.parse()
                .map_err(|e| DataError::Config(format!("{key}={raw}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_core::Operation;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = FeedConfig::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.batch_window, 10);
        assert_eq!(config.retry_policy().max_attempts, 3);
        assert_eq!(config.record_policy, RecordPolicy::AcceptPartial);
        assert!(config.priorities.order(Operation::Quote).is_some());
    }

    #[test]
    fn test_from_lookup() {
        let config = FeedConfig::from_lookup(lookup(&[
            ("TUSHARE_TOKEN", "abc123"),
            ("BAOSTOCK_USER", "  "),
            ("FEED_CACHE_TTL_SECS", "60"),
            ("FEED_BATCH_WINDOW", "4"),
            ("FEED_RETRY_MAX_ATTEMPTS", "5"),
            ("BAOSTOCK_SESSION_MAX_AGE_SECS", "1800"),
        ]))
        .unwrap();

        assert_eq!(config.tushare_token.as_deref(), Some("abc123"));
        assert!(config.baostock_user.is_none());
        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.batch_window, 4);
        assert_eq!(config.retry_policy().max_attempts, 5);
        assert_eq!(config.cache_capacity, 10_000);
        assert_eq!(
            config.baostock_session_max_age(),
            Some(Duration::from_secs(1800))
        );
        assert!(FeedConfig::default().baostock_session_max_age().is_none());
    }

    #[test]
    fn test_from_lookup_rejects_bad_numbers() {
        let err = FeedConfig::from_lookup(lookup(&[("FEED_CALL_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(matches!(err, DataError::Config(ref msg) if msg.contains("FEED_CALL_TIMEOUT_MS")));
    }

    #[test]
    fn test_from_json() {
        let config = FeedConfig::from_json(
            r#"{"cache_capacity": 64, "record_policy": "reject_partial",
                "priorities": {"quote": ["sina"]}}"#,
        )
        .unwrap();

        assert_eq!(config.cache_capacity, 64);
        assert_eq!(config.record_policy, RecordPolicy::RejectPartial);
        assert_eq!(
            config.priorities.order(Operation::Quote).unwrap(),
            &["sina".to_string()]
        );
        assert!(config.priorities.order(Operation::Financials).is_none());
        assert_eq!(config.call_timeout_ms, 30_000);

        assert!(matches!(
            FeedConfig::from_json("{\"batch_window\": \"ten\"}"),
            Err(DataError::Config(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = FeedConfig {
            tushare_token: Some("tok-secret".into()),
            baostock_password: Some("pw-secret".into()),
            ..FeedConfig::default()
        };
        let debug_str = format!("{config:?}");
        assert!(!debug_str.contains("tok-secret"));
        assert!(!debug_str.contains("pw-secret"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
