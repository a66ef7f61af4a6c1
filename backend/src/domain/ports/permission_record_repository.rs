//! Port for persisted per-user permission records.
use async_trait::async_trait;

use crate::domain::{PermissionRecord, UserId};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by permission record adapters.
    pub enum PermissionRecordError {
        /// Repository connection could not be established.
        Connection { message: String } => "permission repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "permission repository query failed: {message}",
        /// A record already exists for the user.
        Duplicate { user_id: String } => "permission record already exists for user {user_id}",
        /// No record exists for the user.
        Missing { user_id: String } => "no permission record for user {user_id}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PermissionRecordRepository: Send + Sync {
    /// Store the record created when an invitation is accepted.
    async fn insert(&self, record: &PermissionRecord) -> Result<(), PermissionRecordError>;

    /// Replace an existing record after an administrative update.
    async fn update(&self, record: &PermissionRecord) -> Result<(), PermissionRecordError>;

    /// Fetch the record for a user.
    async fn find(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PermissionRecord>, PermissionRecordError>;
}
