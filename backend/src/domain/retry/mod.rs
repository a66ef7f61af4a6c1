//! Bounded recovery for one permission-gated store operation.
//!
//! Each call runs a small state machine: local checks, a first attempt, and
//! at most one remedy (session refresh or blind retry) followed by a final
//! attempt. No call ever makes more than two store attempts or more than one
//! refresh, whatever the failures.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::ports::RawError;
use crate::domain::{
    Action, ErrorClassifier, ErrorInfo, PermissionModel, ResourceCategory, SessionGuard, UserId,
};

mod attempt;
mod runtime;

use attempt::Remedy;
pub use runtime::{RetryCollaborators, RetryRuntime, TokioSleeper};

/// Retry policy knobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause before the single blind retry. Zero retries immediately.
    pub blind_retry_delay: Duration,
}

/// Async clock-independent sleeping abstraction for retries.
#[async_trait]
pub trait RetrySleeper: Send + Sync {
    /// Suspend execution for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Runs store operations under the local permission check and the bounded
/// recovery policy.
pub struct RetryOrchestrator {
    permissions: Arc<PermissionModel>,
    session: Arc<SessionGuard>,
    classifier: ErrorClassifier,
    sleeper: Arc<dyn RetrySleeper>,
    policy: RetryPolicy,
}

impl RetryOrchestrator {
    /// Orchestrator using the Tokio sleeper.
    pub fn new(
        collaborators: RetryCollaborators,
        classifier: ErrorClassifier,
        policy: RetryPolicy,
    ) -> Self {
        Self::with_runtime(collaborators, classifier, RetryRuntime::default(), policy)
    }

    /// Orchestrator with injected runtime abstractions.
    pub fn with_runtime(
        collaborators: RetryCollaborators,
        classifier: ErrorClassifier,
        runtime: RetryRuntime,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            permissions: collaborators.permissions,
            session: collaborators.session,
            classifier,
            sleeper: runtime.sleeper,
            policy,
        }
    }

    /// Classifier used for every failure.
    pub fn classifier(&self) -> ErrorClassifier {
        self.classifier
    }

    /// Session guard shared with the gateway.
    pub fn session(&self) -> &Arc<SessionGuard> {
        &self.session
    }

    /// Run `operation` for `user` as `action` on `resource`.
    ///
    /// Local denials and a missing session fail without calling `operation`.
    /// A held session inside its expiry margin is refreshed before the first
    /// attempt; that refresh is the call's only one. The first failure is
    /// classified and picks the remedy: refresh then retry, blind retry, or
    /// surface. If the refresh fails the first failure is returned
    /// unchanged. The second attempt is final.
    pub async fn execute<T, F, Fut>(
        &self,
        user: &UserId,
        resource: ResourceCategory,
        action: Action,
        mut operation: F,
    ) -> Result<T, ErrorInfo>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RawError>>,
    {
        if !self.permissions.check(user, resource, action) {
            debug!(%user, %resource, %action, "denied locally; store not contacted");
            return Err(self.classifier.local_denial(resource, action));
        }
        if !self.session.is_authenticated() {
            debug!(%user, %resource, %action, "no session; store not contacted");
            return Err(self.classifier.missing_session());
        }

        let refreshed = !self.session.is_valid();
        if refreshed {
            if let Err(error) = self.session.refresh().await {
                warn!(
                    failure = error.label(),
                    %error,
                    "refresh of lapsed session failed; store not contacted"
                );
                return Err(self.classifier.lapsed_session());
            }
            debug!(%resource, %action, "lapsed session refreshed before first attempt");
        }

        let first = match operation().await {
            Ok(value) => return Ok(value),
            Err(raw) => self.classifier.classify(&raw),
        };

        match Remedy::for_failure(&first, refreshed) {
            Remedy::Surface => {
                debug!(kind = %first.kind(), %resource, %action, "surfacing non-retryable failure");
                return Err(first);
            }
            Remedy::RefreshThenRetry => {
                if let Err(error) = self.session.refresh().await {
                    warn!(
                        kind = %first.kind(),
                        failure = error.label(),
                        %error,
                        "session refresh failed; surfacing original failure"
                    );
                    return Err(first);
                }
                debug!(%resource, %action, "retrying after session refresh");
            }
            Remedy::BlindRetry => {
                let delay = self.policy.blind_retry_delay;
                if !delay.is_zero() {
                    self.sleeper.sleep(delay).await;
                }
                debug!(kind = %first.kind(), %resource, %action, "retrying once");
            }
        }

        operation().await.map_err(|raw| {
            let info = self.classifier.classify(&raw);
            warn!(
                kind = %info.kind(),
                first_kind = %first.kind(),
                %resource,
                %action,
                "retry failed; giving up"
            );
            info
        })
    }
}
