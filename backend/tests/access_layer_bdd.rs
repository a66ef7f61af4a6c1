//! Behaviour tests for gateway calls against the in-memory adapters.
//!
//! Each scenario accepts an invitation, optionally signs the user in, and
//! drives one gateway call through local permission checks, the simulated
//! row-level security of the store, and the single recovery step.

use std::sync::Arc;
use std::time::Duration;

use gigbook_backend::domain::error_classifier::JWT_EXPIRED;
use gigbook_backend::domain::ports::{RowFilter, StoreError};
use gigbook_backend::domain::{
    ErrorClassifier, ErrorInfo, ErrorKind, PermissionAssignmentService, PermissionModel,
    PermissionSet, ResourceGateway, RetryCollaborators, RetryOrchestrator, RetryPolicy,
    SessionGuard, Table, UserId, WriteRequest,
};
use gigbook_backend::outbound::memory::{
    FixtureAuthProvider, InMemoryPermissionRecordRepository, InMemoryRecordStore,
};
use gigbook_backend::test_support::MutableClock;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::{ScenarioState, given, scenario, then, when};
use serde_json::{Value, json};
use tokio::runtime::Runtime;

const TOKEN_TTL: Duration = Duration::from_secs(3600);

#[derive(Clone)]
struct RuntimeHandle(Arc<Runtime>);

#[derive(Default, ScenarioState)]
struct AccessWorld {
    runtime: Slot<RuntimeHandle>,
    clock: Slot<Arc<MutableClock>>,
    identity: Slot<Arc<FixtureAuthProvider>>,
    store: Slot<Arc<InMemoryRecordStore>>,
    gateway: Slot<Arc<ResourceGateway>>,
    user: Slot<UserId>,
    last_result: Slot<Result<Vec<Value>, ErrorInfo>>,
}

impl AccessWorld {
    /// Wire a gateway for a user who accepted `invitation`.
    fn setup(&self, invitation: Value, signed_in: bool) {
        let runtime = Runtime::new().expect("create runtime");
        let clock = Arc::new(MutableClock::default());
        let identity = Arc::new(FixtureAuthProvider::new(clock.clone(), TOKEN_TTL));
        let store = Arc::new(InMemoryRecordStore::new(identity.clone()));
        let permissions = Arc::new(PermissionModel::default());
        let assignments = PermissionAssignmentService::new(
            Arc::new(InMemoryPermissionRecordRepository::new()),
            permissions.clone(),
        );

        let user = UserId::random();
        let granted = runtime
            .block_on(assignments.accept_invitation(&user, invitation))
            .expect("invitation accepted");
        store.grant(user.clone(), granted);
        store.seed(Table::Events, [json!({ "id": 1, "title": "Spring gala" })]);
        store.seed(Table::Payments, [json!({ "id": 1, "amount": 250 })]);

        let session = Arc::new(SessionGuard::new(
            identity.clone(),
            clock.clone(),
            Duration::from_secs(30),
        ));
        if signed_in {
            identity.sign_in(&user);
        }
        runtime
            .block_on(session.restore())
            .expect("session restore");

        let orchestrator = Arc::new(RetryOrchestrator::new(
            RetryCollaborators::new(permissions, session),
            ErrorClassifier::default(),
            RetryPolicy::default(),
        ));
        let gateway = Arc::new(ResourceGateway::new(
            user.clone(),
            store.clone(),
            orchestrator,
        ));

        self.runtime.set(RuntimeHandle(Arc::new(runtime)));
        self.clock.set(clock);
        self.identity.set(identity);
        self.store.set(store);
        self.gateway.set(gateway);
        self.user.set(user);
    }

    fn read(&self, table: Table) {
        let runtime = self.runtime.get().expect("runtime should be set");
        let gateway = self.gateway.get().expect("gateway should be set");
        let result = runtime.0.block_on(gateway.read(table, RowFilter::all()));
        self.last_result.set(result);
    }

    fn failure(&self) -> ErrorInfo {
        self.last_result
            .get()
            .expect("a call should have run")
            .expect_err("call should fail")
    }
}

#[fixture]
fn world() -> AccessWorld {
    AccessWorld::default()
}

#[given("a signed-in user invited with the user role")]
fn a_signed_in_user(world: &AccessWorld) {
    world.setup(json!({ "role": "user" }), true);
}

#[given("a signed-out user invited with the user role")]
fn a_signed_out_user(world: &AccessWorld) {
    world.setup(json!({ "role": "user" }), false);
}

#[given("a signed-in user invited with accounting read access")]
fn a_signed_in_user_with_accounting_reads(world: &AccessWorld) {
    world.setup(
        json!({ "role": "user", "permissions": { "accounting": { "read": true } } }),
        true,
    );
}

#[given("a signed-in admin")]
fn a_signed_in_admin(world: &AccessWorld) {
    world.setup(json!({ "role": "admin" }), true);
}

#[given("the access token has expired")]
fn the_access_token_has_expired(world: &AccessWorld) {
    let clock = world.clock.get().expect("clock should be set");
    clock.advance(TOKEN_TTL + Duration::from_secs(1));
}

#[given("the refresh credential has been revoked")]
fn the_refresh_credential_has_been_revoked(world: &AccessWorld) {
    let identity = world.identity.get().expect("identity should be set");
    identity.revoke_refresh();
}

#[given("the next store call fails to fetch")]
fn the_next_store_call_fails_to_fetch(world: &AccessWorld) {
    let store = world.store.get().expect("store should be set");
    store.fail_next(StoreError::message_only("TypeError: Failed to fetch"));
}

#[given("the store rejects the next token as expired")]
fn the_store_rejects_the_next_token(world: &AccessWorld) {
    let store = world.store.get().expect("store should be set");
    store.fail_next(StoreError::with_code(JWT_EXPIRED, "JWT expired"));
}

#[given("the store refuses every request from the user")]
fn the_store_refuses_every_request(world: &AccessWorld) {
    let store = world.store.get().expect("store should be set");
    let user = world.user.get().expect("user should be set");
    store.grant(user, PermissionSet::default());
}

#[when("the user reads events")]
fn the_user_reads_events(world: &AccessWorld) {
    world.read(Table::Events);
}

#[when("the user reads payments")]
fn the_user_reads_payments(world: &AccessWorld) {
    world.read(Table::Payments);
}

#[when("the user records a payment")]
fn the_user_records_a_payment(world: &AccessWorld) {
    let runtime = world.runtime.get().expect("runtime should be set");
    let gateway = world.gateway.get().expect("gateway should be set");
    let result = runtime.0.block_on(gateway.write(
        Table::Payments,
        WriteRequest::Insert {
            payload: json!({ "id": 2, "amount": 90 }),
        },
    ));
    world.last_result.set(result);
}

#[then("the call succeeds with the seeded rows")]
fn the_call_succeeds(world: &AccessWorld) {
    let rows = world
        .last_result
        .get()
        .expect("a call should have run")
        .expect("call should succeed");
    assert_eq!(rows.len(), 1);
}

#[then("the call fails with a permission denial")]
fn the_call_fails_with_a_permission_denial(world: &AccessWorld) {
    assert_eq!(world.failure().kind(), ErrorKind::RlsPermissionDenied);
}

#[then("the call fails with a session expiry")]
fn the_call_fails_with_a_session_expiry(world: &AccessWorld) {
    let failure = world.failure();
    assert_eq!(failure.kind(), ErrorKind::AuthSessionExpired);
    assert!(failure.should_refresh_auth());
}

#[then("the call fails with an invalid session")]
fn the_call_fails_with_an_invalid_session(world: &AccessWorld) {
    let failure = world.failure();
    assert_eq!(failure.kind(), ErrorKind::AuthInvalid);
    assert!(!failure.should_retry());
}

#[then("the failure is not retryable")]
fn the_failure_is_not_retryable(world: &AccessWorld) {
    let failure = world.failure();
    assert!(!failure.should_retry());
    assert!(!failure.should_refresh_auth());
}

#[then("the store was called {count} times")]
fn the_store_was_called(world: &AccessWorld, count: usize) {
    let store = world.store.get().expect("store should be set");
    assert_eq!(store.calls(), count);
}

#[scenario(
    path = "tests/features/access_layer.feature",
    name = "A standard user cannot write accounting records"
)]
fn standard_user_cannot_write_accounting(world: AccessWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/access_layer.feature",
    name = "A standard user reads events"
)]
fn standard_user_reads_events(world: AccessWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/access_layer.feature",
    name = "An inviter override grants accounting reads"
)]
fn inviter_override_grants_accounting_reads(world: AccessWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/access_layer.feature",
    name = "An expired access token is refreshed transparently"
)]
fn expired_token_is_refreshed(world: AccessWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/access_layer.feature",
    name = "A token rejected by the store is refreshed and retried"
)]
fn store_rejected_token_is_refreshed(world: AccessWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/access_layer.feature",
    name = "A revoked refresh credential surfaces the expiry"
)]
fn revoked_refresh_surfaces_expiry(world: AccessWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/access_layer.feature",
    name = "A transient network failure is retried once"
)]
fn transient_network_failure_is_retried(world: AccessWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/access_layer.feature",
    name = "A server-side denial is surfaced without a retry"
)]
fn server_side_denial_is_surfaced(world: AccessWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/access_layer.feature",
    name = "A signed-out user is asked to log in again"
)]
fn signed_out_user_must_log_in(world: AccessWorld) {
    drop(world);
}
