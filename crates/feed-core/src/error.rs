//! Error types for data operations.
//!
//! This module defines [`DataError`] which covers all error cases that can occur
//! when fetching, parsing, or caching market data, together with the
//! [`FailureRecord`] diagnostics collected while walking a fallback chain.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::request::Operation;
use crate::retry::RetryClass;

/// One provider's failure during a fallback walk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureRecord {
    /// The provider that failed.
    pub provider: String,
    /// Why it failed.
    pub reason: String,
}

impl FailureRecord {
    /// Creates a new failure record.
    #[must_use]
    pub fn new(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.reason)
    }
}

fn join_failures(failures: &[FailureRecord]) -> String {
    if failures.is_empty() {
        return "no provider attempted".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur during data operations.
#[derive(Error, Debug)]
pub enum DataError {
    /// Network-related errors (connection refused, reset, DNS).
    #[error("Network error: {0}")]
    Network(String),

    /// A provider call did not complete in time.
    #[error("Timeout calling {provider} after {after:?}")]
    Timeout {
        /// The provider that timed out.
        provider: String,
        /// How long the call was allowed to run.
        after: Duration,
    },

    /// Rate limit exceeded by a provider.
    #[error("Rate limited by {provider}: retry after {retry_after:?}")]
    RateLimited {
        /// The provider that rate limited the request.
        provider: String,
        /// Suggested time to wait before retrying.
        retry_after: Option<Duration>,
    },

    /// Non-success HTTP status that is not otherwise classified.
    #[error("HTTP {status} from {provider}: {detail}")]
    Http {
        /// The provider that answered.
        provider: String,
        /// HTTP status code.
        status: u16,
        /// Response body excerpt or reason phrase.
        detail: String,
    },

    /// The provider rejected the session token; a new login is required.
    #[error("Session expired for provider {0}")]
    SessionExpired(String),

    /// Authentication failed for a provider.
    #[error("Authentication failed for provider {provider}: {reason}")]
    AuthenticationFailed {
        /// The provider that refused the credentials.
        provider: String,
        /// Reason reported by the provider.
        reason: String,
    },

    /// The provider answered with a body that could not be decoded.
    #[error("Malformed response from {provider}: {detail}")]
    MalformedResponse {
        /// The provider that answered.
        provider: String,
        /// What could not be decoded.
        detail: String,
    },

    /// The provider refused the request with its own error code.
    #[error("{provider} returned error {code}: {message}")]
    Provider {
        /// The provider that refused.
        provider: String,
        /// Provider-specific error code.
        code: String,
        /// Provider-specific message.
        message: String,
    },

    /// A symbol did not match the canonical or provider encoding.
    #[error("Unrecognized symbol format: {0}")]
    UnrecognizedSymbolFormat(String),

    /// The requested symbol was not found.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The requested feature is not supported by this provider.
    #[error("Feature not supported: {0}")]
    NotSupported(String),

    /// No provider in the chain supports the operation.
    #[error("No configured provider supports {0}")]
    UnsupportedOperation(Operation),

    /// Every provider in the chain failed or returned nothing.
    #[error("All providers exhausted for {operation}: {}", join_failures(.failures))]
    AllProvidersExhausted {
        /// The operation that was attempted.
        operation: Operation,
        /// One entry per attempted provider, in attempt order.
        failures: Vec<FailureRecord>,
    },

    /// The requested provider is not configured.
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error interacting with the cache.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl DataError {
    /// Maps a non-success HTTP status from `provider` onto the error taxonomy.
    ///
    /// 429 becomes [`DataError::RateLimited`], 401 becomes
    /// [`DataError::SessionExpired`], everything else is kept as
    /// [`DataError::Http`] so the retry policy can decide on the status.
    #[must_use]
    pub fn from_status(provider: &str, status: u16, detail: impl Into<String>) -> Self {
        match status {
            429 => Self::RateLimited {
                provider: provider.to_string(),
                retry_after: None,
            },
            401 => Self::SessionExpired(provider.to_string()),
            _ => Self::Http {
                provider: provider.to_string(),
                status,
                detail: detail.into(),
            },
        }
    }

    /// Shorthand for a [`DataError::MalformedResponse`].
    #[must_use]
    pub fn malformed(provider: &str, detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider: provider.to_string(),
            detail: detail.into(),
        }
    }

    /// How a retry loop should react to this error.
    #[must_use]
    pub const fn retry_class(&self) -> RetryClass {
        match self {
            Self::Network(_) | Self::Timeout { .. } | Self::RateLimited { .. } => RetryClass::Retry,
            Self::Http { status, .. } => {
                if *status == 408 || *status >= 500 {
                    RetryClass::Retry
                } else {
                    RetryClass::Fatal
                }
            }
            Self::SessionExpired(_) => RetryClass::Reauthenticate,
            _ => RetryClass::Fatal,
        }
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.retry_class(), RetryClass::Retry)
    }
}

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            DataError::from_status("sina", 429, ""),
            DataError::RateLimited { .. }
        ));
        assert!(matches!(
            DataError::from_status("baostock", 401, "unauthorized"),
            DataError::SessionExpired(_)
        ));
        assert!(DataError::from_status("sina", 503, "").is_transient());
        assert!(DataError::from_status("sina", 408, "").is_transient());
        assert!(!DataError::from_status("sina", 404, "").is_transient());
    }

    #[test]
    fn test_retry_class() {
        assert_eq!(
            DataError::Network("reset".into()).retry_class(),
            RetryClass::Retry
        );
        assert_eq!(
            DataError::SessionExpired("baostock".into()).retry_class(),
            RetryClass::Reauthenticate
        );
        assert_eq!(
            DataError::malformed("tushare", "bad json").retry_class(),
            RetryClass::Fatal
        );
    }

    #[test]
    fn test_exhausted_message_lists_failures() {
        let err = DataError::AllProvidersExhausted {
            operation: Operation::Quote,
            failures: vec![
                FailureRecord::new("tushare", "HTTP 503"),
                FailureRecord::new("eastmoney", "empty result"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("quote"));
        assert!(msg.contains("tushare: HTTP 503; eastmoney: empty result"));
    }
}
