//! Access-layer settings loaded via OrthoConfig.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{MessageLocale, UnsupportedLocaleError};
use crate::telemetry::{LogFormat, UnknownLogFormatError};

/// Raised when a configured value cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// `locale` names no message catalogue.
    #[error(transparent)]
    Locale(#[from] UnsupportedLocaleError),
    /// `log_format` is neither `json` nor `text`.
    #[error(transparent)]
    LogFormat(#[from] UnknownLogFormatError),
}

/// Configuration values controlling classification, retries and sessions.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "GIGBOOK_ACCESS")]
pub struct AccessSettings {
    /// Message catalogue code (`en`, `de`).
    pub locale: Option<String>,
    /// Delay before the single blind retry, in milliseconds.
    #[ortho_config(default = 0)]
    pub retry_delay_ms: u64,
    /// Sessions closer than this to expiry count as invalid, in seconds.
    #[ortho_config(default = 30)]
    pub session_expiry_margin_secs: u64,
    /// Log output format (`json`, `text`).
    pub log_format: Option<String>,
}

impl AccessSettings {
    /// Configured message locale, falling back to English.
    pub fn locale(&self) -> Result<MessageLocale, SettingsError> {
        match self.locale.as_deref() {
            Some(code) => Ok(code.parse()?),
            None => Ok(MessageLocale::default()),
        }
    }

    /// Configured blind-retry delay.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Configured session expiry margin.
    pub fn session_expiry_margin(&self) -> Duration {
        Duration::from_secs(self.session_expiry_margin_secs)
    }

    /// Configured log format, falling back to JSON.
    pub fn log_format(&self) -> Result<LogFormat, SettingsError> {
        match self.log_format.as_deref() {
            Some(format) => Ok(format.parse()?),
            None => Ok(LogFormat::default()),
        }
    }
}
