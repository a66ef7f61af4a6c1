//! Port for the identity provider that issues and refreshes sessions.

use async_trait::async_trait;

use crate::domain::Session;

use super::define_port_error;

define_port_error! {
    /// Failures reported by identity provider adapters.
    pub enum AuthFailure {
        /// No session exists to refresh; the user has to log in.
        MissingSession => "no active session",
        /// The provider refused the request (revoked or invalid refresh token).
        Rejected { message: String } => "identity provider rejected the request: {message}",
        /// The provider could not be reached.
        Transport { message: String } => "identity provider unreachable: {message}",
    }
}

impl AuthFailure {
    /// Provider-supplied detail used for text classification.
    pub fn detail(&self) -> &str {
        match self {
            Self::MissingSession => "no active session",
            Self::Rejected { message } | Self::Transport { message } => message.as_str(),
        }
    }
}

/// Identity provider capability used by the session guard.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current session as known to the provider, if any.
    async fn get_session(&self) -> Result<Option<Session>, AuthFailure>;

    /// Exchange the stored refresh credential for a new session.
    async fn refresh_session(&self) -> Result<Session, AuthFailure>;
}
