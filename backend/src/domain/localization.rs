//! User-facing message catalogue for the failure taxonomy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ErrorKind;

/// Locales with a complete message catalogue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageLocale {
    /// English (`en`).
    #[default]
    #[serde(rename = "en")]
    English,
    /// German (`de`).
    #[serde(rename = "de")]
    German,
}

/// Raised when a locale code has no catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported message locale '{code}'; expected en|de")]
pub struct UnsupportedLocaleError {
    /// Code as supplied by the caller.
    pub code: String,
}

impl MessageLocale {
    /// Two-letter locale code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::German => "de",
        }
    }

    /// Catalogue entry for `kind`.
    ///
    /// # Examples
    /// ```
    /// use gigbook_backend::domain::{ErrorKind, MessageLocale};
    ///
    /// let text = MessageLocale::English.message_for(ErrorKind::AuthSessionExpired);
    /// assert_eq!(text, "Your session has expired. Please log in again.");
    /// ```
    #[must_use]
    pub const fn message_for(self, kind: ErrorKind) -> &'static str {
        match self {
            Self::English => english(kind),
            Self::German => german(kind),
        }
    }
}

const fn english(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::RlsPermissionDenied => "You do not have permission to perform this action.",
        ErrorKind::AuthSessionExpired => "Your session has expired. Please log in again.",
        ErrorKind::AuthInvalid => "You are not signed in. Please log in again.",
        ErrorKind::NetworkError => "Network error. Please check your connection and try again.",
        ErrorKind::DatabaseError => "The database could not complete the request. Please try again.",
        ErrorKind::Unknown => "Something went wrong. Please try again.",
    }
}

const fn german(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::RlsPermissionDenied => "Sie haben keine Berechtigung für diese Aktion.",
        ErrorKind::AuthSessionExpired => {
            "Ihre Sitzung ist abgelaufen. Bitte melden Sie sich erneut an."
        }
        ErrorKind::AuthInvalid => "Sie sind nicht angemeldet. Bitte melden Sie sich erneut an.",
        ErrorKind::NetworkError => {
            "Netzwerkfehler. Bitte prüfen Sie Ihre Verbindung und versuchen Sie es erneut."
        }
        ErrorKind::DatabaseError => {
            "Die Datenbank konnte die Anfrage nicht ausführen. Bitte versuchen Sie es erneut."
        }
        ErrorKind::Unknown => "Etwas ist schiefgelaufen. Bitte versuchen Sie es erneut.",
    }
}

impl fmt::Display for MessageLocale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for MessageLocale {
    type Err = UnsupportedLocaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "en-gb" | "en-us" => Ok(Self::English),
            "de" | "de-de" | "de-at" | "de-ch" => Ok(Self::German),
            _ => Err(UnsupportedLocaleError { code: s.to_owned() }),
        }
    }
}
