//! Test utilities for the backend crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`, via
//! the `test-support` feature). Nothing here is used by production wiring.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use tokio::sync::{Notify, mpsc};

use crate::domain::Session;
use crate::domain::ports::{
    AuthFailure, AuthProvider, RecordStore, Row, StoreError, StoreMutation, StoreQuery,
};
use crate::domain::retry::RetrySleeper;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fixed start instant used across suites.
pub fn fixed_now() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).single() {
        Some(now) => now,
        None => panic!("fixed test instant is valid"),
    }
}

/// Clock that only moves when told to.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    /// Clock frozen at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// Move forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let delta = match TimeDelta::from_std(delta) {
            Ok(delta) => delta,
            Err(error) => {
                panic!("failed to convert Duration to TimeDelta: {error}; delta={delta:?}")
            }
        };
        *lock(&self.0) += delta;
    }

    /// Move forward by whole seconds.
    pub fn advance_seconds(&self, seconds: i64) {
        *lock(&self.0) += TimeDelta::seconds(seconds);
    }
}

impl Default for MutableClock {
    fn default() -> Self {
        Self::new(fixed_now())
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *lock(&self.0)
    }
}

/// Sleeper that records requested delays and returns at once.
#[derive(Debug, Default)]
pub struct RecordingSleeper(pub Mutex<Vec<Duration>>);

impl RecordingSleeper {
    /// Delays requested so far.
    pub fn recorded(&self) -> Vec<Duration> {
        lock(&self.0).clone()
    }
}

#[async_trait]
impl RetrySleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        lock(&self.0).push(duration);
    }
}

/// Session expiring one hour after [`fixed_now`].
pub fn session_named(token: &str) -> Session {
    Session::new(token, fixed_now() + TimeDelta::hours(1))
}

/// Identity provider answering from a script and counting refreshes.
///
/// When built with [`ScriptedAuthProvider::gated`], every refresh waits for a
/// `notify_one` on the gate before answering.
pub struct ScriptedAuthProvider {
    current: Mutex<Option<Session>>,
    refreshes: Mutex<VecDeque<Result<Session, AuthFailure>>>,
    refresh_calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl ScriptedAuthProvider {
    /// Provider holding `current` and answering refreshes from `refreshes`.
    pub fn new(
        current: Option<Session>,
        refreshes: impl IntoIterator<Item = Result<Session, AuthFailure>>,
    ) -> Self {
        Self {
            current: Mutex::new(current),
            refreshes: Mutex::new(refreshes.into_iter().collect()),
            refresh_calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Hold every refresh until `gate` is notified.
    #[must_use]
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Number of refresh round trips so far.
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for ScriptedAuthProvider {
    async fn get_session(&self) -> Result<Option<Session>, AuthFailure> {
        Ok(lock(&self.current).clone())
    }

    async fn refresh_session(&self) -> Result<Session, AuthFailure> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let outcome = lock(&self.refreshes)
            .pop_front()
            .unwrap_or_else(|| Err(AuthFailure::rejected("refresh script exhausted")));
        if let Ok(session) = &outcome {
            *lock(&self.current) = Some(session.clone());
        }
        outcome
    }
}

/// Store answering every call from one script and counting calls.
///
/// Entries are consumed in order regardless of whether the call is a query or
/// a mutation. An exhausted script answers with an empty row set.
pub struct ScriptedRecordStore {
    script: Mutex<VecDeque<Result<Vec<Row>, StoreError>>>,
    calls: AtomicUsize,
    entered: Option<mpsc::UnboundedSender<usize>>,
}

impl ScriptedRecordStore {
    /// Store answering from `script`.
    pub fn new(script: impl IntoIterator<Item = Result<Vec<Row>, StoreError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicUsize::new(0),
            entered: None,
        }
    }

    /// Report the running call count on `entered` each time a call starts.
    #[must_use]
    pub fn reporting(mut self, entered: mpsc::UnboundedSender<usize>) -> Self {
        self.entered = Some(entered);
        self
    }

    /// Number of calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self) -> Result<Vec<Row>, StoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(entered) = &self.entered {
            // The receiver may already be gone once a test has what it needs.
            let _ = entered.send(call);
        }
        lock(&self.script).pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[async_trait]
impl RecordStore for ScriptedRecordStore {
    async fn query(&self, _query: &StoreQuery) -> Result<Vec<Row>, StoreError> {
        self.answer()
    }

    async fn mutate(&self, _mutation: &StoreMutation) -> Result<Vec<Row>, StoreError> {
        self.answer()
    }
}
