//! User identity used to key permission sets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Raised when a string is not a usable user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserValidationError {
    /// The identifier was empty.
    #[error("user id must not be empty")]
    EmptyId,
    /// The identifier was not a hyphenated UUID.
    #[error("user id {0:?} is not a hyphenated UUID")]
    InvalidId(String),
}

/// Identity-provider subject that permission sets and row policies key on.
///
/// Identifiers are held in canonical lowercase hyphenated form, so two
/// spellings of the same UUID name the same user.
///
/// # Examples
/// ```
/// use gigbook_backend::domain::UserId;
///
/// let id: UserId = "3FA85F64-5717-4562-B3FC-2C963F66AFA6".parse().unwrap();
/// assert_eq!(id.to_string(), "3fa85f64-5717-4562-b3fc-2c963f66afa6");
/// assert!(" 3fa85f64-5717-4562-b3fc-2c963f66afa6".parse::<UserId>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(Uuid);

impl UserId {
    /// Fresh identifier for fixtures and simulations.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromStr for UserId {
    type Err = UserValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.is_empty() {
            return Err(UserValidationError::EmptyId);
        }
        // Only the 36-character hyphenated form; braced, URN and simple
        // spellings are not subjects the identity provider issues.
        if raw.len() != 36 {
            return Err(UserValidationError::InvalidId(raw.to_owned()));
        }
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| UserValidationError::InvalidId(raw.to_owned()))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for UserId {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
