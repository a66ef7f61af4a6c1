//! Collaborator and runtime bundles for the retry orchestrator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{PermissionModel, SessionGuard};

use super::RetrySleeper;

/// Shared collaborators consulted on every call.
pub struct RetryCollaborators {
    /// Local capability lookups.
    pub permissions: Arc<PermissionModel>,
    /// Session owner used for refreshes.
    pub session: Arc<SessionGuard>,
}

impl RetryCollaborators {
    /// Bundle the collaborators.
    pub fn new(permissions: Arc<PermissionModel>, session: Arc<SessionGuard>) -> Self {
        Self {
            permissions,
            session,
        }
    }
}

/// Runtime helpers used by the retry policy.
pub struct RetryRuntime {
    /// Async sleep implementation.
    pub sleeper: Arc<dyn RetrySleeper>,
}

impl Default for RetryRuntime {
    fn default() -> Self {
        Self {
            sleeper: Arc::new(TokioSleeper),
        }
    }
}

/// Tokio-based sleeper implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl RetrySleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
