//! Store tables reachable through the gateway and their resource categories.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ResourceCategory;

/// Tables exposed by the booking store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// Scheduled events.
    Events,
    /// Musicians that can be booked.
    Musicians,
    /// Bookings linking musicians to events.
    Bookings,
    /// Fees and payouts.
    Payments,
    /// Per-user permission records.
    UserPermissions,
}

/// Raised when a table name is not part of the schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown table '{name}'")]
pub struct UnknownTableError {
    /// Name as supplied by the caller.
    pub name: String,
}

impl Table {
    /// Table name as used by the store.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Events => "events",
            Self::Musicians => "musicians",
            Self::Bookings => "bookings",
            Self::Payments => "payments",
            Self::UserPermissions => "user_permissions",
        }
    }

    /// Resource category whose capability gates this table.
    ///
    /// # Examples
    /// ```
    /// use gigbook_backend::domain::{ResourceCategory, Table};
    ///
    /// assert_eq!(Table::Musicians.category(), ResourceCategory::Events);
    /// assert_eq!(Table::Payments.category(), ResourceCategory::Accounting);
    /// ```
    #[must_use]
    pub const fn category(self) -> ResourceCategory {
        match self {
            Self::Events | Self::Musicians | Self::Bookings => ResourceCategory::Events,
            Self::Payments => ResourceCategory::Accounting,
            Self::UserPermissions => ResourceCategory::Admin,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = UnknownTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "events" => Ok(Self::Events),
            "musicians" => Ok(Self::Musicians),
            "bookings" => Ok(Self::Bookings),
            "payments" => Ok(Self::Payments),
            "user_permissions" => Ok(Self::UserPermissions),
            other => Err(UnknownTableError {
                name: other.to_owned(),
            }),
        }
    }
}
