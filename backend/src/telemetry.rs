//! Tracing subscriber initialisation.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt as subscriber_fmt};

/// Output format for log records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per record.
    #[default]
    Json,
    /// Human-readable compact lines.
    Text,
}

/// Raised when a log format name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log format '{name}'; expected json|text")]
pub struct UnknownLogFormatError {
    /// Name as supplied by the caller.
    pub name: String,
}

impl FromStr for LogFormat {
    type Err = UnknownLogFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            _ => Err(UnknownLogFormatError { name: s.to_owned() }),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Text => "text",
        })
    }
}

/// Install the global subscriber, filtered by `RUST_LOG`.
///
/// A second call (or a subscriber installed elsewhere) is reported as a
/// warning rather than treated as fatal.
pub fn init_tracing(format: LogFormat) {
    let builder = subscriber_fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    let result = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.compact().try_init(),
    };
    if let Err(e) = result {
        warn!(error = %e, "tracing init failed");
    }
}
