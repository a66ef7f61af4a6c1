//! Classification of raw store and identity-provider failures.
//!
//! Rules are ordered and the first match wins:
//!
//! 1. Store codes: `42501` is a permission denial; `PGRST301` and `PGRST302`
//!    mean the session token expired or is invalid.
//! 2. Lower-cased message text: `jwt` with `expired` or `invalid`; then
//!    `permission denied` or `insufficient privilege`; then `network` or
//!    `fetch`.
//! 3. Channel fallbacks: any other coded store failure is a database error,
//!    identity-provider transport failures are network errors, and other
//!    identity-provider failures mean the user has to log in again.
//! 4. Everything else is [`ErrorKind::Unknown`].
//!
//! Text matching is coarse. A false positive only changes the message and the
//! retry affordance; a false negative falls through to a retryable kind.

use serde_json::json;
use tracing::debug;

use super::ports::{AuthFailure, RawError, StoreError};
use super::{Action, ErrorInfo, ErrorKind, MessageLocale, ResourceCategory};

/// Postgres `insufficient_privilege`, raised by row-level security.
pub const INSUFFICIENT_PRIVILEGE: &str = "42501";
/// PostgREST: JWT expired.
pub const JWT_EXPIRED: &str = "PGRST301";
/// PostgREST: JWT invalid.
pub const JWT_INVALID: &str = "PGRST302";

/// Maps raw failures onto the taxonomy using one message catalogue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorClassifier {
    locale: MessageLocale,
}

impl ErrorClassifier {
    /// Classifier producing messages in `locale`.
    #[must_use]
    pub const fn new(locale: MessageLocale) -> Self {
        Self { locale }
    }

    /// Locale used for messages.
    #[must_use]
    pub const fn locale(&self) -> MessageLocale {
        self.locale
    }

    /// Classify any raw failure. Total: every input yields exactly one
    /// [`ErrorInfo`].
    ///
    /// # Examples
    /// ```
    /// use gigbook_backend::domain::ports::{RawError, StoreError};
    /// use gigbook_backend::domain::{ErrorClassifier, ErrorKind};
    ///
    /// let classifier = ErrorClassifier::default();
    /// let info = classifier.classify(&RawError::from(StoreError::message_only("JWT expired")));
    /// assert_eq!(info.kind(), ErrorKind::AuthSessionExpired);
    /// assert!(info.should_retry() && info.should_refresh_auth());
    /// ```
    #[must_use]
    pub fn classify(&self, raw: &RawError) -> ErrorInfo {
        let (kind, code) = match raw {
            RawError::Store(error) => (classify_store(error), error.code()),
            RawError::Auth(failure) => (classify_auth(failure), None),
        };
        debug!(%kind, code, "classified access failure");

        let info = self.info(kind);
        match code {
            Some(code) => info.with_details(json!({ "code": code })),
            None => info,
        }
    }

    /// Failure reported when the local permission model refuses an action
    /// before any store call is made.
    #[must_use]
    pub fn local_denial(&self, resource: ResourceCategory, action: Action) -> ErrorInfo {
        self.info(ErrorKind::RlsPermissionDenied).with_details(json!({
            "resource": resource,
            "action": action,
            "origin": "local",
        }))
    }

    /// Failure reported when no session is available locally.
    #[must_use]
    pub fn missing_session(&self) -> ErrorInfo {
        self.info(ErrorKind::AuthInvalid)
            .with_details(json!({ "origin": "local" }))
    }

    /// Failure reported when a locally expired session could not be
    /// refreshed before the store was contacted.
    #[must_use]
    pub fn lapsed_session(&self) -> ErrorInfo {
        self.info(ErrorKind::AuthSessionExpired)
            .with_details(json!({ "origin": "local" }))
    }

    fn info(&self, kind: ErrorKind) -> ErrorInfo {
        ErrorInfo::from_catalogue(kind, self.locale.message_for(kind))
    }
}

/// Classify with the default (English) catalogue.
#[must_use]
pub fn classify(raw: &RawError) -> ErrorInfo {
    ErrorClassifier::default().classify(raw)
}

fn classify_store(error: &StoreError) -> ErrorKind {
    let code = error.code();
    code.and_then(classify_code)
        .or_else(|| classify_message(error.message()))
        .unwrap_or(match code {
            Some(_) => ErrorKind::DatabaseError,
            None => ErrorKind::Unknown,
        })
}

fn classify_auth(failure: &AuthFailure) -> ErrorKind {
    classify_message(failure.detail()).unwrap_or(match failure {
        AuthFailure::Transport { .. } => ErrorKind::NetworkError,
        AuthFailure::MissingSession | AuthFailure::Rejected { .. } => ErrorKind::AuthInvalid,
    })
}

fn classify_code(code: &str) -> Option<ErrorKind> {
    match code {
        INSUFFICIENT_PRIVILEGE => Some(ErrorKind::RlsPermissionDenied),
        JWT_EXPIRED | JWT_INVALID => Some(ErrorKind::AuthSessionExpired),
        _ => None,
    }
}

fn classify_message(message: &str) -> Option<ErrorKind> {
    let text = message.to_lowercase();
    if text.contains("jwt") && (text.contains("expired") || text.contains("invalid")) {
        return Some(ErrorKind::AuthSessionExpired);
    }
    if text.contains("permission denied") || text.contains("insufficient privilege") {
        return Some(ErrorKind::RlsPermissionDenied);
    }
    if text.contains("network") || text.contains("fetch") {
        return Some(ErrorKind::NetworkError);
    }
    None
}

#[cfg(test)]
mod tests {
    //! Classification rule coverage.
    use super::*;
    use rstest::rstest;

    fn store(code: Option<&str>, message: &str) -> RawError {
        match code {
            Some(code) => StoreError::with_code(code, message).into(),
            None => StoreError::message_only(message).into(),
        }
    }

    #[rstest]
    #[case("permission denied for table payments")]
    #[case("JWT expired")]
    #[case("Failed to fetch")]
    #[case("")]
    fn insufficient_privilege_code_wins_over_text(#[case] message: &str) {
        let info = classify(&store(Some("42501"), message));
        assert_eq!(info.kind(), ErrorKind::RlsPermissionDenied);
        assert!(!info.should_retry());
        assert!(!info.should_refresh_auth());
    }

    #[rstest]
    #[case("PGRST301", "JWT expired")]
    #[case("PGRST302", "permission denied")]
    #[case("PGRST301", "")]
    fn postgrest_token_codes_require_refresh(#[case] code: &str, #[case] message: &str) {
        let info = classify(&store(Some(code), message));
        assert_eq!(info.kind(), ErrorKind::AuthSessionExpired);
        assert!(info.should_retry());
        assert!(info.should_refresh_auth());
    }

    #[rstest]
    #[case("JWT expired", ErrorKind::AuthSessionExpired)]
    #[case("invalid JWT: signature mismatch", ErrorKind::AuthSessionExpired)]
    #[case("permission denied for table events", ErrorKind::RlsPermissionDenied)]
    #[case("Insufficient Privilege", ErrorKind::RlsPermissionDenied)]
    #[case("Failed to fetch", ErrorKind::NetworkError)]
    #[case("NetworkError when attempting to fetch resource.", ErrorKind::NetworkError)]
    #[case("jwt is fine", ErrorKind::Unknown)]
    #[case("duplicate key value violates unique constraint", ErrorKind::Unknown)]
    fn uncoded_store_failures_fall_back_to_text(
        #[case] message: &str,
        #[case] expected: ErrorKind,
    ) {
        assert_eq!(classify(&store(None, message)).kind(), expected);
    }

    #[rstest]
    fn jwt_text_takes_precedence_over_network_text() {
        let info = classify(&store(None, "fetch failed: JWT expired"));
        assert_eq!(info.kind(), ErrorKind::AuthSessionExpired);
    }

    #[rstest]
    #[case("23505", "duplicate key value violates unique constraint")]
    #[case("PGRST116", "JSON object requested, multiple rows returned")]
    fn other_coded_failures_are_database_errors(#[case] code: &str, #[case] message: &str) {
        let info = classify(&store(Some(code), message));
        assert_eq!(info.kind(), ErrorKind::DatabaseError);
        assert!(info.should_retry());
        assert!(!info.should_refresh_auth());
        assert_eq!(info.details(), Some(&json!({ "code": code })));
    }

    #[rstest]
    #[case(AuthFailure::transport("connection reset"), ErrorKind::NetworkError)]
    #[case(AuthFailure::transport("Failed to fetch"), ErrorKind::NetworkError)]
    #[case(AuthFailure::rejected("Invalid Refresh Token: Already Used"), ErrorKind::AuthInvalid)]
    #[case(AuthFailure::rejected("JWT expired"), ErrorKind::AuthSessionExpired)]
    #[case(AuthFailure::missing_session(), ErrorKind::AuthInvalid)]
    fn auth_failures_use_text_then_channel(
        #[case] failure: AuthFailure,
        #[case] expected: ErrorKind,
    ) {
        assert_eq!(classify(&RawError::from(failure)).kind(), expected);
    }

    #[rstest]
    fn every_classification_respects_refresh_implies_retry() {
        let inputs = [
            store(Some("42501"), ""),
            store(Some("PGRST301"), ""),
            store(Some("PGRST302"), ""),
            store(Some("XX000"), "internal"),
            store(None, "JWT expired"),
            store(None, "permission denied"),
            store(None, "network down"),
            store(None, "???"),
            AuthFailure::missing_session().into(),
            AuthFailure::rejected("nope").into(),
            AuthFailure::transport("offline").into(),
        ];
        for raw in &inputs {
            let info = classify(raw);
            assert!(!info.should_refresh_auth() || info.should_retry(), "{raw:?}");
        }
    }

    #[rstest]
    fn messages_follow_the_configured_locale() {
        let classifier = ErrorClassifier::new(MessageLocale::German);
        let info = classifier.classify(&store(Some("42501"), "denied"));
        assert_eq!(
            info.message(),
            MessageLocale::German.message_for(ErrorKind::RlsPermissionDenied)
        );
    }

    #[rstest]
    fn lapsed_session_asks_for_a_refresh() {
        let info = ErrorClassifier::default().lapsed_session();
        assert_eq!(info.kind(), ErrorKind::AuthSessionExpired);
        assert!(info.should_refresh_auth());
        assert_eq!(info.details(), Some(&json!({ "origin": "local" })));
    }

    #[rstest]
    fn local_denial_names_resource_and_action() {
        let info = ErrorClassifier::default().local_denial(ResourceCategory::Accounting, Action::Write);
        assert_eq!(info.kind(), ErrorKind::RlsPermissionDenied);
        assert_eq!(
            info.details(),
            Some(&json!({ "resource": "accounting", "action": "write", "origin": "local" }))
        );
    }
}
