//! Concurrent gateway calls share one session refresh.

use std::sync::Arc;
use std::time::Duration;

use gigbook_backend::domain::error_classifier::JWT_EXPIRED;
use gigbook_backend::domain::ports::{AuthFailure, RowFilter, StoreError};
use gigbook_backend::domain::{
    ErrorClassifier, ErrorKind, PermissionModel, ResourceGateway, RetryCollaborators,
    RetryOrchestrator, RetryPolicy, Role, Session, SessionGuard, Table, UserId,
};
use gigbook_backend::test_support::{
    MutableClock, ScriptedAuthProvider, ScriptedRecordStore, session_named,
};
use rstest::rstest;
use serde_json::json;
use tokio::sync::{Notify, mpsc};
use tokio::time::timeout;

struct Fixture {
    gateway: ResourceGateway,
    provider: Arc<ScriptedAuthProvider>,
    store: Arc<ScriptedRecordStore>,
    session: Arc<SessionGuard>,
    entered: mpsc::UnboundedReceiver<usize>,
    gate: Arc<Notify>,
}

fn expired() -> StoreError {
    StoreError::with_code(JWT_EXPIRED, "JWT expired")
}

fn fixture(refreshes: Vec<Result<Session, AuthFailure>>) -> Fixture {
    let permissions = Arc::new(PermissionModel::default());
    let user = UserId::random();
    permissions.assign(user.clone(), permissions.defaults_for_role(Role::Admin));

    let gate = Arc::new(Notify::new());
    let provider = Arc::new(ScriptedAuthProvider::new(None, refreshes).gated(gate.clone()));
    let session = Arc::new(SessionGuard::new(
        provider.clone(),
        Arc::new(MutableClock::default()),
        Duration::from_secs(30),
    ));
    session.login(session_named("stale"));

    let (tx, entered) = mpsc::unbounded_channel();
    let store = Arc::new(
        ScriptedRecordStore::new([
            Err(expired()),
            Err(expired()),
            Ok(vec![json!({ "id": 1 })]),
            Ok(vec![json!({ "id": 2 })]),
        ])
        .reporting(tx),
    );

    let orchestrator = Arc::new(RetryOrchestrator::new(
        RetryCollaborators::new(permissions, session.clone()),
        ErrorClassifier::default(),
        RetryPolicy::default(),
    ));
    Fixture {
        gateway: ResourceGateway::new(user, store.clone(), orchestrator),
        provider,
        store,
        session,
        entered,
        gate,
    }
}

/// Wait until both first attempts have reached the store, then let the
/// single pending refresh answer.
async fn release_after_two_attempts(entered: &mut mpsc::UnboundedReceiver<usize>, gate: &Notify) {
    for _ in 0..2 {
        timeout(Duration::from_secs(1), entered.recv())
            .await
            .expect("first attempts should reach the store")
            .expect("store reports entries");
    }
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    gate.notify_one();
}

#[rstest]
#[tokio::test]
async fn two_expired_calls_share_one_refresh() {
    let Fixture {
        gateway,
        provider,
        store,
        session,
        mut entered,
        gate,
    } = fixture(vec![Ok(session_named("renewed"))]);

    let (first, second, ()) = tokio::join!(
        gateway.read(Table::Events, RowFilter::all()),
        gateway.read_events(RowFilter::all()),
        release_after_two_attempts(&mut entered, &gate),
    );

    assert!(first.is_ok(), "first call recovers: {first:?}");
    assert!(second.is_ok(), "second call recovers: {second:?}");
    assert_eq!(provider.refresh_calls(), 1);
    assert_eq!(store.calls(), 4);
    let current = session.session().expect("session present");
    assert_eq!(current.token().expose(), "renewed");
}

#[rstest]
#[tokio::test]
async fn a_shared_refresh_failure_surfaces_the_original_expiry_to_both_callers() {
    let Fixture {
        gateway,
        provider,
        store,
        mut entered,
        gate,
        ..
    } = fixture(vec![Err(AuthFailure::rejected("Invalid Refresh Token"))]);

    let (first, second, ()) = tokio::join!(
        gateway.read(Table::Events, RowFilter::all()),
        gateway.read(Table::Events, RowFilter::all()),
        release_after_two_attempts(&mut entered, &gate),
    );

    for outcome in [first, second] {
        let err = outcome.expect_err("refresh failed");
        assert_eq!(err.kind(), ErrorKind::AuthSessionExpired);
        assert_eq!(err.details(), Some(&json!({ "code": JWT_EXPIRED })));
    }
    assert_eq!(provider.refresh_calls(), 1);
    assert_eq!(store.calls(), 2);
}
