//! Fixture identity provider issuing short-lived random tokens.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeDelta;
use mockable::Clock;
use uuid::Uuid;

use crate::domain::ports::{AuthFailure, AuthProvider};
use crate::domain::{Session, UserId};

/// Token state as seen by a store sharing this provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    /// Nobody is signed in.
    Missing,
    /// The access token has expired; a refresh would renew it.
    Expired,
    /// The access token is current for this user.
    Active(UserId),
}

#[derive(Default)]
struct IdentityState {
    user: Option<UserId>,
    session: Option<Session>,
    refresh_revoked: bool,
}

/// In-process identity provider.
///
/// Sessions expire `ttl` after issue according to the injected clock.
/// Refreshing issues a new token for the signed-in user unless the refresh
/// credential has been revoked.
pub struct FixtureAuthProvider {
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
    state: Mutex<IdentityState>,
}

impl FixtureAuthProvider {
    /// Provider issuing tokens valid for `ttl`.
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            clock,
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            state: Mutex::new(IdentityState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IdentityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn issue(&self) -> Session {
        let now = self.clock.utc();
        let expires_at = now.checked_add_signed(self.ttl).unwrap_or(now);
        Session::new(Uuid::new_v4().to_string(), expires_at)
    }

    /// Sign `user` in and return their fresh session.
    pub fn sign_in(&self, user: &UserId) -> Session {
        let session = self.issue();
        let mut state = self.lock();
        state.user = Some(user.clone());
        state.session = Some(session.clone());
        state.refresh_revoked = false;
        session
    }

    /// Forget the signed-in user.
    pub fn sign_out(&self) {
        *self.lock() = IdentityState::default();
    }

    /// Make every later refresh fail until the next sign-in.
    pub fn revoke_refresh(&self) {
        self.lock().refresh_revoked = true;
    }

    /// Current token state at the clock's present instant.
    pub fn token_state(&self) -> TokenState {
        let now = self.clock.utc();
        let state = self.lock();
        match (&state.user, &state.session) {
            (Some(user), Some(session)) if session.is_valid_at(now, TimeDelta::zero()) => {
                TokenState::Active(user.clone())
            }
            (Some(_), Some(_)) => TokenState::Expired,
            _ => TokenState::Missing,
        }
    }
}

#[async_trait]
impl AuthProvider for FixtureAuthProvider {
    async fn get_session(&self) -> Result<Option<Session>, AuthFailure> {
        Ok(self.lock().session.clone())
    }

    async fn refresh_session(&self) -> Result<Session, AuthFailure> {
        let renewed = self.issue();
        let mut state = self.lock();
        if state.user.is_none() {
            return Err(AuthFailure::missing_session());
        }
        if state.refresh_revoked {
            return Err(AuthFailure::rejected("Invalid Refresh Token: Revoked"));
        }
        state.session = Some(renewed.clone());
        Ok(renewed)
    }
}
