//! Remedy chosen after a failed first attempt.
//!
//! Only the first failure selects a remedy; the outcome of the second attempt
//! is always final.

use crate::domain::ErrorInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Remedy {
    RefreshThenRetry,
    BlindRetry,
    Surface,
}

impl Remedy {
    /// Remedy for `info`. A call that already refreshed its session before
    /// the first attempt may not refresh again.
    pub(super) fn for_failure(info: &ErrorInfo, refreshed: bool) -> Self {
        match (info.should_refresh_auth(), info.should_retry()) {
            (true, _) if refreshed => Self::Surface,
            (true, _) => Self::RefreshThenRetry,
            (false, true) => Self::BlindRetry,
            (false, false) => Self::Surface,
        }
    }
}
