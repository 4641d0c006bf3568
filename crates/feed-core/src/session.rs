//! Login session lifecycle for stateful providers.
//!
//! A [`SessionManager`] owns at most one [`Session`] for its provider. Logins
//! are single flight: concurrent callers that find no usable session wait on
//! the same lock and reuse the session the first of them created.
//!
//! ```text
//! NoSession --ensure--> Authenticating --ok--> Active --mark_expired/max_age--> Expired
//!     ^                      |                                                  |
//!     +-------fail-----------+                      Authenticating <--ensure----+
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{DataError, Result};

/// Performs the provider-specific login and logout calls.
#[async_trait]
pub trait Authenticator: Send + Sync + fmt::Debug {
    /// Logs in and returns the session token.
    async fn login(&self) -> Result<String>;

    /// Ends the session identified by `token`.
    async fn logout(&self, token: &str) -> Result<()>;
}

/// An authenticated session.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    generation: u64,
    created_at: Instant,
}

impl Session {
    /// Token to attach to provider calls.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Increases by one with every successful login.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// When the login completed.
    #[must_use]
    pub const fn created_at(&self) -> Instant {
        self.created_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("generation", &self.generation)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Observable state of a [`SessionManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Never logged in, logged out, or the last login failed.
    NoSession,
    /// A login is in flight.
    Authenticating,
    /// A usable session exists.
    Active,
    /// The session was rejected or outlived its maximum age.
    Expired,
}

impl SessionState {
    const fn to_u8(self) -> u8 {
        match self {
            Self::NoSession => 0,
            Self::Authenticating => 1,
            Self::Active => 2,
            Self::Expired => 3,
        }
    }

    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Authenticating,
            2 => Self::Active,
            3 => Self::Expired,
            _ => Self::NoSession,
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    session: Option<Session>,
    expired: bool,
}

/// Single-flight owner of one provider's session.
pub struct SessionManager {
    provider: String,
    authenticator: Arc<dyn Authenticator>,
    slot: Mutex<Slot>,
    state: AtomicU8,
    generation: AtomicU64,
    max_age: Option<Duration>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("provider", &self.provider)
            .field("state", &self.state())
            .field("logins", &self.login_count())
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl SessionManager {
    /// Creates a manager with no session.
    #[must_use]
    pub fn new(provider: impl Into<String>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            provider: provider.into(),
            authenticator,
            slot: Mutex::new(Slot::default()),
            state: AtomicU8::new(SessionState::NoSession.to_u8()),
            generation: AtomicU64::new(0),
            max_age: None,
        }
    }

    /// Treats sessions older than `max_age` as expired.
    #[must_use]
    pub const fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Provider this manager logs in to.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Number of successful logins so far.
    #[must_use]
    pub fn login_count(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }

    fn usable<'s>(&self, slot: &'s Slot) -> Option<&'s Session> {
        if slot.expired {
            return None;
        }
        slot.session.as_ref().filter(|session| {
            self.max_age
                .is_none_or(|max_age| session.created_at.elapsed() < max_age)
        })
    }

    /// Returns the active session, logging in first if there is none.
    ///
    /// Callers arriving while a login is in flight wait for it and share its
    /// result. A failed login leaves the manager in
    /// [`SessionState::NoSession`] and returns
    /// [`DataError::AuthenticationFailed`].
    pub async fn ensure_session(&self) -> Result<Session> {
        let mut slot = self.slot.lock().await;
        if let Some(session) = self.usable(&slot) {
            return Ok(session.clone());
        }
        if slot.session.is_some() {
            debug!(provider = %self.provider, "Session unusable, logging in again");
        }

        self.set_state(SessionState::Authenticating);
        match self.authenticator.login().await {
            Ok(token) => {
                let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
                let session = Session {
                    token,
                    generation,
                    created_at: Instant::now(),
                };
                slot.session = Some(session.clone());
                slot.expired = false;
                self.set_state(SessionState::Active);
                info!(provider = %self.provider, generation, "Logged in");
                Ok(session)
            }
            Err(err) => {
                slot.session = None;
                slot.expired = false;
                self.set_state(SessionState::NoSession);
                warn!(provider = %self.provider, error = %err, "Login failed");
                Err(match err {
                    DataError::AuthenticationFailed { .. } => err,
                    other => DataError::AuthenticationFailed {
                        provider: self.provider.clone(),
                        reason: other.to_string(),
                    },
                })
            }
        }
    }

    /// Marks `session` as rejected by the provider.
    ///
    /// Only takes effect if `session` is still the current one, so callers
    /// holding a stale session cannot invalidate a newer login. Returns true if
    /// the current session was expired.
    pub async fn mark_expired(&self, session: &Session) -> bool {
        let mut slot = self.slot.lock().await;
        let is_current = slot
            .session
            .as_ref()
            .is_some_and(|current| current.generation == session.generation);
        if is_current && !slot.expired {
            slot.expired = true;
            self.set_state(SessionState::Expired);
            debug!(provider = %self.provider, generation = session.generation, "Session expired");
            return true;
        }
        false
    }

    /// Ends the current session, if any.
    pub async fn logout(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        let Some(session) = slot.session.take() else {
            return Ok(());
        };
        slot.expired = false;
        self.set_state(SessionState::NoSession);
        self.authenticator.logout(&session.token).await.inspect_err(|err| {
            warn!(provider = %self.provider, error = %err, "Logout failed");
        })
    }
}
