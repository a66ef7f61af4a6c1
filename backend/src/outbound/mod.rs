//! Outbound adapters implementing domain ports.
//!
//! Adapters are thin translators between domain types and the collaborator
//! they front. They contain no access-control or recovery logic.
//!
//! - **memory**: in-process store, identity provider, and permission record
//!   repository.

pub mod memory;
