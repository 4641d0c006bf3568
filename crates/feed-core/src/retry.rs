//! Retry logic with exponential backoff and jitter.
//!
//! [`Retrier`] wraps one provider call. Transient failures are retried after
//! `base * multiplier^n` (capped, plus random jitter); an expired session is
//! refreshed through the provider's [`SessionManager`] without spending an
//! attempt; anything else is returned immediately.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{DataError, Result};
use crate::session::SessionManager;

/// How a retry loop should react to an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryClass {
    /// Transient: back off and try again.
    Retry,
    /// The session is gone: log in again, then retry.
    Reauthenticate,
    /// Retrying cannot help.
    Fatal,
}

/// Backoff parameters for one provider call.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero behaves like one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Upper bound for the exponential part of the delay.
    pub max_delay: Duration,
    /// Upper bound of the uniform random delay added on top.
    pub jitter: Duration,
    /// HTTP status codes treated as transient.
    pub retry_on_status: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(250),
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` and default backoff.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Single attempt, no backoff.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    /// Sets the base delay.
    #[must_use]
    pub const fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Sets the growth factor.
    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub const fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Sets the jitter bound. `Duration::ZERO` makes delays deterministic.
    #[must_use]
    pub const fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Check if a given HTTP status code should trigger a retry.
    #[must_use]
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }

    /// Delay to wait after the failed attempt `attempt` (0-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scale = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let seconds = (self.base_delay.as_secs_f64() * scale).min(self.max_delay.as_secs_f64());
        let mut delay = Duration::from_secs_f64(seconds.max(0.0));

        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms > 0 {
            delay += Duration::from_millis(fastrand::u64(0..=jitter_ms));
        }
        delay
    }

    /// Classifies an error under this policy.
    ///
    /// HTTP statuses follow [`retry_on_status`](Self::retry_on_status); every
    /// other error follows [`DataError::retry_class`].
    #[must_use]
    pub fn classify(&self, error: &DataError) -> RetryClass {
        match error {
            DataError::Http { status, .. } => {
                if self.should_retry_status(*status) {
                    RetryClass::Retry
                } else {
                    RetryClass::Fatal
                }
            }
            other => other.retry_class(),
        }
    }
}

/// Runs one provider call under a [`RetryPolicy`].
#[derive(Debug)]
pub struct Retrier<'a> {
    policy: &'a RetryPolicy,
    session: Option<&'a SessionManager>,
    provider: &'a str,
}

impl<'a> Retrier<'a> {
    /// Retrier without a session manager.
    #[must_use]
    pub const fn new(policy: &'a RetryPolicy) -> Self {
        Self {
            policy,
            session: None,
            provider: "",
        }
    }

    /// Attaches the session manager used to recover from expired sessions.
    #[must_use]
    pub const fn with_session(mut self, session: Option<&'a SessionManager>) -> Self {
        self.session = session;
        self
    }

    /// Names the provider in log events.
    #[must_use]
    pub const fn for_provider(mut self, provider: &'a str) -> Self {
        self.provider = provider;
        self
    }

    /// Calls `op` until it succeeds, fails fatally or runs out of attempts.
    ///
    /// On exhaustion the last error is returned. Session refreshes do not
    /// count as attempts but are capped at `max_attempts` per call.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;
        let mut refreshes = 0u32;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            match self.policy.classify(&err) {
                RetryClass::Reauthenticate => {
                    let Some(session) = self.session else {
                        return Err(err);
                    };
                    if refreshes >= max_attempts {
                        warn!(provider = self.provider, "Session refresh limit reached");
                        return Err(err);
                    }
                    refreshes += 1;
                    warn!(
                        provider = self.provider,
                        refresh = refreshes,
                        "Session expired, re-authenticating"
                    );
                    session.ensure_session().await?;
                }
                RetryClass::Retry if attempt + 1 < max_attempts => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    debug!(
                        provider = self.provider,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                _ => return Err(err),
            }
        }
    }
}

/// Runs `op` under `policy` with no session manager.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    Retrier::new(policy).run(op).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Authenticator, SessionManager};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn deterministic(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts)
            .with_base_delay(Duration::from_secs(1))
            .with_multiplier(2.0)
            .with_jitter(Duration::ZERO)
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = deterministic(5).with_max_delay(Duration::from_secs(3));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(3));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(3));
    }

    #[test]
    fn test_jitter_stays_in_bound() {
        let policy = deterministic(3).with_jitter(Duration::from_millis(100));
        for _ in 0..50 {
            let delay = policy.delay_for_attempt(0);
            assert!(delay >= Duration::from_secs(1));
            assert!(delay <= Duration::from_millis(1100));
        }
    }

    #[test]
    fn test_status_classification_follows_policy() {
        let policy = RetryPolicy::default();
        let unavailable = DataError::from_status("sina", 503, "");
        let not_found = DataError::from_status("sina", 404, "");
        assert_eq!(policy.classify(&unavailable), RetryClass::Retry);
        assert_eq!(policy.classify(&not_found), RetryClass::Fatal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_schedule() {
        let policy = deterministic(3);
        let start = Instant::now();
        let offsets = Mutex::new(Vec::new());

        let result: Result<()> = with_retry(&policy, || {
            offsets.lock().unwrap().push(start.elapsed().as_secs());
            async { Err(DataError::Network("connection reset".into())) }
        })
        .await;

        assert!(matches!(result, Err(DataError::Network(_))));
        assert_eq!(*offsets.lock().unwrap(), vec![0, 1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&deterministic(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DataError::malformed("tushare", "truncated body")) }
        })
        .await;

        assert!(matches!(result, Err(DataError::MalformedResponse { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&deterministic(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(DataError::from_status("eastmoney", 502, "bad gateway"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[derive(Debug, Default)]
    struct CountingAuth {
        logins: AtomicU32,
    }

    #[async_trait]
    impl Authenticator for CountingAuth {
        async fn login(&self) -> Result<String> {
            let n = self.logins.fetch_add(1, Ordering::SeqCst);
            Ok(format!("token-{n}"))
        }

        async fn logout(&self, _token: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_refresh_does_not_spend_attempts() {
        let auth = Arc::new(CountingAuth::default());
        let manager = SessionManager::new("baostock", auth.clone());
        let policy = deterministic(1);
        let calls = AtomicU32::new(0);
        let (manager_ref, calls_ref) = (&manager, &calls);

        let result = Retrier::new(&policy)
            .with_session(Some(&manager))
            .run(move || async move {
                let (manager, calls) = (manager_ref, calls_ref);
                let session = manager.ensure_session().await?;
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    manager.mark_expired(&session).await;
                    return Err(DataError::SessionExpired("baostock".into()));
                }
                Ok(session.token().to_string())
            })
            .await;

        assert_eq!(result.unwrap(), "token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(auth.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_session_expired_without_manager_is_fatal() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&deterministic(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DataError::SessionExpired("tushare".into())) }
        })
        .await;

        assert!(matches!(result, Err(DataError::SessionExpired(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
