//! Domain ports and supporting types for the hexagonal boundary.
//!
//! The store, the identity provider, and permission-record persistence are
//! external collaborators. Each port exposes strongly typed errors so adapters
//! map their failures into predictable variants.

mod macros;
pub(crate) use macros::define_port_error;

mod auth_provider;
mod permission_record_repository;
mod record_store;

#[cfg(test)]
pub use auth_provider::MockAuthProvider;
pub use auth_provider::{AuthFailure, AuthProvider};
#[cfg(test)]
pub use permission_record_repository::MockPermissionRecordRepository;
pub use permission_record_repository::{PermissionRecordError, PermissionRecordRepository};
#[cfg(test)]
pub use record_store::MockRecordStore;
pub use record_store::{
    MutationKind, RecordStore, Row, RowFilter, StoreError, StoreMutation, StoreQuery,
};

/// Tagged union of every failure shape the access layer receives.
///
/// Failures are classified as soon as they cross the boundary; nothing past
/// the classifier inspects these shapes again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RawError {
    /// Failure from the record store.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Failure from the identity provider.
    #[error(transparent)]
    Auth(#[from] AuthFailure),
}
