//! In-memory record store simulating row-level security.
//!
//! Every call first checks the shared [`FixtureAuthProvider`] token: no
//! session answers `PGRST302`, an expired token answers `PGRST301`. The
//! signed-in user's server-side policy is then consulted and a refusal
//! answers `42501`, exactly as the managed store would.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::domain::error_classifier::{INSUFFICIENT_PRIVILEGE, JWT_EXPIRED, JWT_INVALID};
use crate::domain::ports::{
    MutationKind, RecordStore, Row, RowFilter, StoreError, StoreMutation, StoreQuery,
};
use crate::domain::{Action, PermissionSet, Table, UserId};

use super::{FixtureAuthProvider, TokenState};

/// PostgREST: request body is not valid JSON for the operation.
const INVALID_PAYLOAD: &str = "PGRST102";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Row store with per-user policies and scripted outages.
pub struct InMemoryRecordStore {
    identity: Arc<FixtureAuthProvider>,
    policies: Mutex<HashMap<UserId, PermissionSet>>,
    tables: Mutex<HashMap<Table, Vec<Row>>>,
    outages: Mutex<VecDeque<StoreError>>,
    calls: AtomicUsize,
}

impl InMemoryRecordStore {
    /// Empty store authenticating through `identity`.
    pub fn new(identity: Arc<FixtureAuthProvider>) -> Self {
        Self {
            identity,
            policies: Mutex::new(HashMap::new()),
            tables: Mutex::new(HashMap::new()),
            outages: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Install the server-side policy for `user`.
    pub fn grant(&self, user: UserId, policy: PermissionSet) {
        lock(&self.policies).insert(user, policy);
    }

    /// Append `rows` to `table`.
    pub fn seed(&self, table: Table, rows: impl IntoIterator<Item = Row>) {
        lock(&self.tables).entry(table).or_default().extend(rows);
    }

    /// Copy of every row in `table`.
    pub fn rows(&self, table: Table) -> Vec<Row> {
        lock(&self.tables).get(&table).cloned().unwrap_or_default()
    }

    /// Fail the next call with `error` before any other check.
    pub fn fail_next(&self, error: StoreError) {
        lock(&self.outages).push_back(error);
    }

    /// Number of calls received, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn admit(&self, table: Table, action: Action) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(outage) = lock(&self.outages).pop_front() {
            return Err(outage);
        }
        let user = match self.identity.token_state() {
            TokenState::Active(user) => user,
            TokenState::Expired => return Err(StoreError::with_code(JWT_EXPIRED, "JWT expired")),
            TokenState::Missing => {
                return Err(StoreError::with_code(JWT_INVALID, "invalid JWT: no session"));
            }
        };
        let allowed = lock(&self.policies)
            .get(&user)
            .is_some_and(|policy| policy.allows(table.category(), action));
        if allowed {
            Ok(())
        } else {
            debug!(%user, %table, %action, "row-level security refused the request");
            Err(StoreError::with_code(
                INSUFFICIENT_PRIVILEGE,
                format!("permission denied for table {table}"),
            ))
        }
    }
}

fn object_payload(payload: Option<&Value>) -> Result<&serde_json::Map<String, Value>, StoreError> {
    payload
        .and_then(Value::as_object)
        .ok_or_else(|| StoreError::with_code(INVALID_PAYLOAD, "payload must be a JSON object"))
}

fn apply(rows: &mut Vec<Row>, mutation: &StoreMutation) -> Result<Vec<Row>, StoreError> {
    match mutation.kind {
        MutationKind::Insert => {
            let payload = Value::Object(object_payload(mutation.payload.as_ref())?.clone());
            rows.push(payload.clone());
            Ok(vec![payload])
        }
        MutationKind::Update => {
            let changes = object_payload(mutation.payload.as_ref())?;
            let mut updated = Vec::new();
            for row in rows.iter_mut().filter(|row| mutation.filter.matches(row)) {
                if let Value::Object(columns) = row {
                    columns.extend(changes.iter().map(|(key, value)| (key.clone(), value.clone())));
                }
                updated.push(row.clone());
            }
            Ok(updated)
        }
        MutationKind::Delete => {
            let (removed, kept): (Vec<Row>, Vec<Row>) = rows
                .drain(..)
                .partition(|row| mutation.filter.matches(row));
            *rows = kept;
            Ok(removed)
        }
    }
}

fn required_action(kind: MutationKind) -> Action {
    match kind {
        MutationKind::Insert | MutationKind::Update => Action::Write,
        MutationKind::Delete => Action::Delete,
    }
}

fn select(rows: Option<&Vec<Row>>, filter: &RowFilter) -> Vec<Row> {
    rows.map(|rows| rows.iter().filter(|row| filter.matches(row)).cloned().collect())
        .unwrap_or_default()
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn query(&self, query: &StoreQuery) -> Result<Vec<Row>, StoreError> {
        self.admit(query.table, Action::Read)?;
        Ok(select(lock(&self.tables).get(&query.table), &query.filter))
    }

    async fn mutate(&self, mutation: &StoreMutation) -> Result<Vec<Row>, StoreError> {
        self.admit(mutation.table, required_action(mutation.kind))?;
        let mut tables = lock(&self.tables);
        apply(tables.entry(mutation.table).or_default(), mutation)
    }
}
