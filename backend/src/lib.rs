//! Permission-gated access and error recovery for the booking store.
//!
//! Application code calls [`domain::ResourceGateway`]; every failure comes
//! back as a classified [`domain::ErrorInfo`] after at most one transparent
//! recovery step.

pub mod config;
pub mod domain;
pub mod outbound;
pub mod telemetry;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::{AccessSettings, SettingsError};
pub use domain::{ErrorInfo, ErrorKind, ResourceGateway, get_user_friendly_message};
