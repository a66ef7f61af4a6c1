//! Domain primitives and services of the access layer.
//!
//! Purpose: classify store and identity-provider failures, hold the
//! per-user permission model, own the session, and run permission-gated
//! store operations with bounded recovery. Everything outside this module
//! talks to it through [`ResourceGateway`] and the traits in [`ports`].
//!
//! Public surface:
//! - [`ErrorInfo`] / [`ErrorKind`]: classified failure presented to callers.
//! - [`ErrorClassifier`]: total mapping from [`ports::RawError`].
//! - [`PermissionModel`] and the capability types in `permissions`.
//! - [`SessionGuard`]: session ownership and single-flight refresh.
//! - [`RetryOrchestrator`]: bounded recovery for one operation.
//! - [`ResourceGateway`]: the application-facing facade.
//! - [`PermissionAssignmentService`]: invitation acceptance and updates.

pub mod error;
pub mod error_classifier;
pub mod gateway;
pub mod localization;
pub mod permission_assignment;
pub mod permission_model;
pub mod permissions;
pub mod ports;
pub mod retry;
pub mod session;
pub mod table;
pub mod user;

pub use self::error::{
    ErrorInfo, ErrorInfoValidationError, ErrorKind, Recovery, get_user_friendly_message,
};
pub use self::error_classifier::{ErrorClassifier, classify};
pub use self::gateway::{ResourceGateway, WriteRequest};
pub use self::localization::{MessageLocale, UnsupportedLocaleError};
pub use self::permission_assignment::{PermissionAssignmentError, PermissionAssignmentService};
pub use self::permission_model::PermissionModel;
pub use self::permissions::{
    Action, Capability, CapabilityOverride, DefaultPermissionTable, InvitationError,
    InvitationMetadata, PermissionOverride, PermissionParseError, PermissionRecord,
    PermissionSet, ResourceCategory, Role,
};
pub use self::retry::{
    RetryCollaborators, RetryOrchestrator, RetryPolicy, RetryRuntime, RetrySleeper, TokioSleeper,
};
pub use self::session::{Session, SessionGuard, SessionToken};
pub use self::table::{Table, UnknownTableError};
pub use self::user::{UserId, UserValidationError};
