//! Port for the row-level-secured booking store.
//!
//! Row-level security is enforced by the store itself. Adapters surface its
//! failures as [`StoreError`] values carrying the machine-readable code (for
//! example `42501` or `PGRST301`) when the store supplied one.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::Table;

/// One row as returned by the store.
pub type Row = Value;

/// Raw store failure exactly as the adapter received it.
///
/// # Examples
/// ```
/// use gigbook_backend::domain::ports::StoreError;
///
/// let err = StoreError::with_code("42501", "permission denied for table events");
/// assert_eq!(err.code(), Some("42501"));
/// assert_eq!(StoreError::message_only("Failed to fetch").code(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct StoreError {
    code: Option<String>,
    message: String,
}

impl StoreError {
    /// Failure carrying a machine-readable code.
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Failure that arrived without a code.
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Machine-readable code, when present and non-blank.
    pub fn code(&self) -> Option<&str> {
        self.code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Conjunction of column equality predicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowFilter(BTreeMap<String, Value>);

impl RowFilter {
    /// Filter matching every row.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter matching rows whose `column` equals `value`.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and_eq(column, value)
    }

    /// Add another equality predicate.
    #[must_use]
    pub fn and_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    /// Iterate over `(column, value)` predicates.
    pub fn predicates(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(column, value)| (column.as_str(), value))
    }

    /// Whether `row` satisfies every predicate.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        self.predicates()
            .all(|(column, expected)| row.get(column) == Some(expected))
    }
}

/// Read request.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    /// Table to read.
    pub table: Table,
    /// Rows to return.
    pub filter: RowFilter,
}

/// Kind of write issued against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    /// Insert `payload` as a new row.
    Insert,
    /// Merge `payload` into every row matching the filter.
    Update,
    /// Remove every row matching the filter.
    Delete,
}

/// Write request.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreMutation {
    /// Table to modify.
    pub table: Table,
    /// Kind of write.
    pub kind: MutationKind,
    /// Rows affected by updates and deletes; ignored for inserts.
    pub filter: RowFilter,
    /// Column values for inserts and updates.
    pub payload: Option<Value>,
}

/// Store capability consumed by the gateway.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read rows matching the query.
    async fn query(&self, query: &StoreQuery) -> Result<Vec<Row>, StoreError>;

    /// Apply a mutation and return the affected rows.
    async fn mutate(&self, mutation: &StoreMutation) -> Result<Vec<Row>, StoreError>;
}
