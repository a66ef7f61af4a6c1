//! Failure taxonomy presented to callers of the access layer.
//!
//! Every failed store or identity-provider call is folded into an
//! [`ErrorInfo`] before it leaves the domain. The recovery flags on an
//! [`ErrorInfo`] are derived from its [`ErrorKind`], so the pairing of kind and
//! flags is fixed by [`ErrorKind::recovery`] rather than by each call site.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Closed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Row-level security or a local permission check refused the action.
    RlsPermissionDenied,
    /// The session token expired or was rejected as stale.
    AuthSessionExpired,
    /// There is no usable session; the user has to log in again.
    AuthInvalid,
    /// The request never reached the store or the response was lost.
    NetworkError,
    /// The store rejected the request for a reason other than permissions.
    DatabaseError,
    /// Nothing more specific matched.
    Unknown,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::RlsPermissionDenied,
        Self::AuthSessionExpired,
        Self::AuthInvalid,
        Self::NetworkError,
        Self::DatabaseError,
        Self::Unknown,
    ];

    /// Recovery policy attached to this kind.
    ///
    /// # Examples
    /// ```
    /// use gigbook_backend::domain::ErrorKind;
    ///
    /// let recovery = ErrorKind::AuthSessionExpired.recovery();
    /// assert!(recovery.should_retry && recovery.should_refresh_auth);
    /// assert!(!ErrorKind::RlsPermissionDenied.recovery().should_retry);
    /// ```
    #[must_use]
    pub const fn recovery(self) -> Recovery {
        match self {
            Self::RlsPermissionDenied | Self::AuthInvalid => Recovery::SURFACE,
            Self::AuthSessionExpired => Recovery::REFRESH_THEN_RETRY,
            Self::NetworkError | Self::DatabaseError | Self::Unknown => Recovery::RETRY,
        }
    }

    /// Stable snake_case identifier, matching the serde representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RlsPermissionDenied => "rls_permission_denied",
            Self::AuthSessionExpired => "auth_session_expired",
            Self::AuthInvalid => "auth_invalid",
            Self::NetworkError => "network_error",
            Self::DatabaseError => "database_error",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remediation flags for one taxonomy entry.
///
/// ## Invariants
/// - `should_refresh_auth` implies `should_retry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovery {
    /// The operation may be attempted again after remediation.
    pub should_retry: bool,
    /// Remediation requires refreshing the session first.
    pub should_refresh_auth: bool,
}

impl Recovery {
    const SURFACE: Self = Self {
        should_retry: false,
        should_refresh_auth: false,
    };
    const RETRY: Self = Self {
        should_retry: true,
        should_refresh_auth: false,
    };
    const REFRESH_THEN_RETRY: Self = Self {
        should_retry: true,
        should_refresh_auth: true,
    };
}

/// Validation errors emitted by the [`ErrorInfo`] constructors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorInfoValidationError {
    /// Message was blank once trimmed.
    #[error("error message must not be empty")]
    EmptyMessage,
    /// Serialised recovery flags disagree with the kind.
    #[error("recovery flags do not match error kind {kind}")]
    InconsistentRecovery { kind: ErrorKind },
}

/// Classified failure handed to the presentation layer.
///
/// ## Invariants
/// - `message` is non-empty once trimmed.
/// - `should_retry` and `should_refresh_auth` always equal
///   `kind.recovery()`.
///
/// # Examples
/// ```
/// use gigbook_backend::domain::{ErrorInfo, ErrorKind};
///
/// let info = ErrorInfo::try_new(ErrorKind::NetworkError, "offline").unwrap();
/// assert!(info.should_retry());
/// assert!(!info.should_refresh_auth());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ErrorInfoDto", into = "ErrorInfoDto")]
pub struct ErrorInfo {
    kind: ErrorKind,
    message: String,
    details: Option<Value>,
}

impl ErrorInfo {
    /// Fallible constructor that validates the message content.
    pub fn try_new(
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Result<Self, ErrorInfoValidationError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(ErrorInfoValidationError::EmptyMessage);
        }
        Ok(Self {
            kind,
            message,
            details: None,
        })
    }

    /// Build from a catalogue entry, which is never blank.
    pub(crate) fn from_catalogue(kind: ErrorKind, message: &'static str) -> Self {
        Self {
            kind,
            message: message.to_owned(),
            details: None,
        }
    }

    /// Failure category.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Localised user-facing message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Whether the operation is safe to retry after remediation.
    pub fn should_retry(&self) -> bool {
        self.kind.recovery().should_retry
    }

    /// Whether remediation requires a session refresh.
    pub fn should_refresh_auth(&self) -> bool {
        self.kind.recovery().should_refresh_auth
    }

    /// Supplementary structured context (resource, action, store code).
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Attach structured details to the error.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ErrorInfo {}

/// Message suitable for direct display.
///
/// # Examples
/// ```
/// use gigbook_backend::domain::{get_user_friendly_message, ErrorInfo, ErrorKind};
///
/// let info = ErrorInfo::try_new(ErrorKind::Unknown, "Something went wrong").unwrap();
/// assert_eq!(get_user_friendly_message(&info), "Something went wrong");
/// ```
pub fn get_user_friendly_message(info: &ErrorInfo) -> &str {
    info.message()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorInfoDto {
    kind: ErrorKind,
    message: String,
    should_retry: bool,
    should_refresh_auth: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl From<ErrorInfo> for ErrorInfoDto {
    fn from(value: ErrorInfo) -> Self {
        let recovery = value.kind.recovery();
        Self {
            kind: value.kind,
            message: value.message,
            should_retry: recovery.should_retry,
            should_refresh_auth: recovery.should_refresh_auth,
            details: value.details,
        }
    }
}

impl TryFrom<ErrorInfoDto> for ErrorInfo {
    type Error = ErrorInfoValidationError;

    fn try_from(value: ErrorInfoDto) -> Result<Self, Self::Error> {
        let ErrorInfoDto {
            kind,
            message,
            should_retry,
            should_refresh_auth,
            details,
        } = value;

        let recovery = kind.recovery();
        if recovery.should_retry != should_retry
            || recovery.should_refresh_auth != should_refresh_auth
        {
            return Err(ErrorInfoValidationError::InconsistentRecovery { kind });
        }

        let mut info = ErrorInfo::try_new(kind, message)?;
        info.details = details;
        Ok(info)
    }
}
