//! In-process adapters for demos and behavioural tests.
//!
//! The record store and the identity provider share token state the way a
//! hosted database client shares its auth session: refreshing through the
//! provider immediately makes the store accept requests again.

mod identity;
mod permission_records;
mod record_store;

pub use identity::{FixtureAuthProvider, TokenState};
pub use permission_records::InMemoryPermissionRecordRepository;
pub use record_store::InMemoryRecordStore;
