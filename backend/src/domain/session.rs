//! Session ownership and single-flight refresh.
//!
//! [`SessionGuard`] is the only owner of the caller's [`Session`]. Concurrent
//! callers that need a refresh attach to one shared in-flight future instead
//! of starting their own round trip to the identity provider. The in-flight
//! slot is cleared by the shared future itself once the provider answers, so
//! every waiter observes the same outcome and no lock is held while waiting.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use mockable::Clock;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::ports::{AuthFailure, AuthProvider};

/// Opaque bearer token. The value is wiped from memory on drop and never
/// printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(Zeroizing<String>);

impl SessionToken {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }

    /// Raw token for the transport layer.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.expose())
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Token plus absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: SessionToken,
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Session carrying `token` until `expires_at`.
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: SessionToken::new(token),
            expires_at,
        }
    }

    /// Bearer token.
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    /// Absolute expiry.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the session is still usable at `now` with `margin` to spare.
    ///
    /// ```
    /// use chrono::{TimeDelta, TimeZone, Utc};
    /// use gigbook_backend::domain::Session;
    ///
    /// let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).single().unwrap();
    /// let session = Session::new("token", now + TimeDelta::seconds(60));
    /// assert!(session.is_valid_at(now, TimeDelta::seconds(30)));
    /// assert!(!session.is_valid_at(now, TimeDelta::seconds(60)));
    /// ```
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: TimeDelta) -> bool {
        self.expires_at
            .checked_sub_signed(margin)
            .is_some_and(|deadline| now < deadline)
    }
}

type RefreshOutcome = Result<Session, AuthFailure>;
type InFlightRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum GuardState {
    Unauthenticated,
    Active(Session),
}

struct GuardInner {
    state: GuardState,
    // Bumped by login, logout and every new refresh; a refresh only settles
    // state when its generation is still current.
    generation: u64,
    in_flight: Option<(u64, InFlightRefresh)>,
}

impl GuardInner {
    fn settle(&mut self, generation: u64, outcome: &RefreshOutcome) {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|(pending, _)| *pending == generation)
        {
            self.in_flight = None;
        }
        if self.generation != generation {
            debug!(generation, "discarding stale session refresh outcome");
            return;
        }
        self.state = match outcome {
            Ok(session) => GuardState::Active(session.clone()),
            Err(_) => GuardState::Unauthenticated,
        };
    }
}

/// Owner of the current session.
pub struct SessionGuard {
    provider: Arc<dyn AuthProvider>,
    clock: Arc<dyn Clock>,
    expiry_margin: TimeDelta,
    inner: Arc<Mutex<GuardInner>>,
}

impl SessionGuard {
    /// Unauthenticated guard. Sessions closer than `expiry_margin` to expiry
    /// count as invalid.
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        clock: Arc<dyn Clock>,
        expiry_margin: Duration,
    ) -> Self {
        Self {
            provider,
            clock,
            expiry_margin: TimeDelta::from_std(expiry_margin).unwrap_or(TimeDelta::MAX),
            inner: Arc::new(Mutex::new(GuardInner {
                state: GuardState::Unauthenticated,
                generation: 0,
                in_flight: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GuardInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adopt a session obtained by an interactive login.
    pub fn login(&self, session: Session) {
        let mut inner = self.lock();
        inner.generation = inner.generation.wrapping_add(1);
        inner.in_flight = None;
        inner.state = GuardState::Active(session);
        info!("session established");
    }

    /// Drop the session. Pending refreshes no longer affect the guard.
    pub fn logout(&self) {
        let mut inner = self.lock();
        inner.generation = inner.generation.wrapping_add(1);
        inner.in_flight = None;
        inner.state = GuardState::Unauthenticated;
        info!("session cleared");
    }

    /// Adopt the session the identity provider already holds, if any.
    ///
    /// Returns whether a session was adopted.
    pub async fn restore(&self) -> Result<bool, AuthFailure> {
        match self.provider.get_session().await? {
            Some(session) => {
                self.login(session);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Whether a session is held, regardless of expiry.
    pub fn is_authenticated(&self) -> bool {
        matches!(self.lock().state, GuardState::Active(_))
    }

    /// Whether the held session is unexpired (with the configured margin).
    pub fn is_valid(&self) -> bool {
        let now = self.clock.utc();
        match &self.lock().state {
            GuardState::Active(session) => session.is_valid_at(now, self.expiry_margin),
            GuardState::Unauthenticated => false,
        }
    }

    /// Copy of the held session.
    pub fn session(&self) -> Option<Session> {
        match &self.lock().state {
            GuardState::Active(session) => Some(session.clone()),
            GuardState::Unauthenticated => None,
        }
    }

    /// Refresh the session, joining a refresh that is already in flight.
    ///
    /// On failure the guard becomes unauthenticated and later calls fail
    /// with [`AuthFailure::MissingSession`] until the next login.
    pub async fn refresh(&self) -> Result<Session, AuthFailure> {
        let pending = {
            let mut inner = self.lock();
            if let Some((_, pending)) = &inner.in_flight {
                info!("joining in-flight session refresh");
                pending.clone()
            } else if inner.state == GuardState::Unauthenticated {
                debug!("refresh requested without a session");
                return Err(AuthFailure::missing_session());
            } else {
                inner.generation = inner.generation.wrapping_add(1);
                let generation = inner.generation;
                let pending = self.start_refresh(generation);
                inner.in_flight = Some((generation, pending.clone()));
                info!(generation, "session refresh started");
                pending
            }
        };
        pending.await
    }

    fn start_refresh(&self, generation: u64) -> InFlightRefresh {
        let provider = Arc::clone(&self.provider);
        let inner = Arc::clone(&self.inner);
        async move {
            let outcome = provider.refresh_session().await;
            match &outcome {
                Ok(_) => info!(generation, "session refresh succeeded"),
                Err(error) => {
                    warn!(generation, failure = error.label(), %error, "session refresh failed");
                }
            }
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .settle(generation, &outcome);
            outcome
        }
        .boxed()
        .shared()
    }
}

impl fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("SessionGuard")
            .field("state", &inner.state)
            .field("refresh_in_flight", &inner.in_flight.is_some())
            .field("expiry_margin", &self.expiry_margin)
            .finish_non_exhaustive()
    }
}
