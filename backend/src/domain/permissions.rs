//! Capability types, role defaults, and the persisted permission record.
//!
//! A user's [`PermissionSet`] is resolved once, when their invitation is
//! accepted, from the [`DefaultPermissionTable`] entry for their [`Role`] and
//! an optional [`PermissionOverride`] chosen by the inviter. Absent categories
//! deny every action.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::UserId;

/// Resource categories guarded by capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    /// Events, musicians and bookings.
    Events,
    /// Payments and other money flows.
    Accounting,
    /// User and permission administration.
    Admin,
}

impl ResourceCategory {
    /// Every category, in declaration order.
    pub const ALL: [Self; 3] = [Self::Events, Self::Accounting, Self::Admin];

    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Events => "events",
            Self::Accounting => "accounting",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a permission name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionParseError {
    /// Resource category is not part of the model.
    #[error("unknown resource category '{name}'")]
    UnknownResource { name: String },
    /// Action is not read, write or delete.
    #[error("unknown action '{name}'")]
    UnknownAction { name: String },
    /// Role has no default permission table entry.
    #[error("unknown role '{name}'")]
    UnknownRole { name: String },
}

impl FromStr for ResourceCategory {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| PermissionParseError::UnknownResource { name: s.to_owned() })
    }
}

/// Action a capability can permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Read rows.
    Read,
    /// Insert or update rows.
    Write,
    /// Delete rows.
    Delete,
}

impl Action {
    /// Every action, in declaration order.
    pub const ALL: [Self; 3] = [Self::Read, Self::Write, Self::Delete];

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| PermissionParseError::UnknownAction { name: s.to_owned() })
    }
}

/// Read/write/delete flags for one resource category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    /// Rows may be read.
    pub read: bool,
    /// Rows may be inserted or updated.
    pub write: bool,
    /// Rows may be deleted.
    pub delete: bool,
}

impl Capability {
    /// Nothing permitted.
    pub const NONE: Self = Self {
        read: false,
        write: false,
        delete: false,
    };
    /// Reads only.
    pub const READ_ONLY: Self = Self {
        read: true,
        write: false,
        delete: false,
    };
    /// Everything permitted.
    pub const FULL: Self = Self {
        read: true,
        write: true,
        delete: true,
    };

    /// Whether `action` is permitted.
    #[must_use]
    pub const fn allows(self, action: Action) -> bool {
        match action {
            Action::Read => self.read,
            Action::Write => self.write,
            Action::Delete => self.delete,
        }
    }
}

/// Per-field override of one [`Capability`]; `None` keeps the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CapabilityOverride {
    /// Replacement for `read`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
    /// Replacement for `write`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write: Option<bool>,
    /// Replacement for `delete`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<bool>,
}

impl CapabilityOverride {
    /// Apply the present fields on top of `base`.
    #[must_use]
    pub fn apply_to(self, base: Capability) -> Capability {
        Capability {
            read: self.read.unwrap_or(base.read),
            write: self.write.unwrap_or(base.write),
            delete: self.delete.unwrap_or(base.delete),
        }
    }
}

/// Capabilities of one user, keyed by resource category.
///
/// # Examples
/// ```
/// use gigbook_backend::domain::{Action, Capability, PermissionSet, ResourceCategory};
///
/// let set = PermissionSet::default().with(ResourceCategory::Events, Capability::READ_ONLY);
/// assert!(set.allows(ResourceCategory::Events, Action::Read));
/// assert!(!set.allows(ResourceCategory::Events, Action::Write));
/// assert!(!set.allows(ResourceCategory::Admin, Action::Read));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeMap<ResourceCategory, Capability>);

impl PermissionSet {
    /// Set the capability for `resource`.
    #[must_use]
    pub fn with(mut self, resource: ResourceCategory, capability: Capability) -> Self {
        self.0.insert(resource, capability);
        self
    }

    /// Capability for `resource`, if the set mentions it.
    #[must_use]
    pub fn capability(&self, resource: ResourceCategory) -> Option<Capability> {
        self.0.get(&resource).copied()
    }

    /// Whether `action` on `resource` is permitted; absent categories deny.
    #[must_use]
    pub fn allows(&self, resource: ResourceCategory, action: Action) -> bool {
        self.capability(resource)
            .is_some_and(|capability| capability.allows(action))
    }

    /// Iterate over `(category, capability)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceCategory, Capability)> + '_ {
        self.0.iter().map(|(resource, capability)| (*resource, *capability))
    }
}

/// Inviter- or administrator-supplied changes to a permission set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionOverride(BTreeMap<ResourceCategory, CapabilityOverride>);

impl PermissionOverride {
    /// Set the override for `resource`.
    #[must_use]
    pub fn with(mut self, resource: ResourceCategory, change: CapabilityOverride) -> Self {
        self.0.insert(resource, change);
        self
    }

    /// Whether the override changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|change| *change == CapabilityOverride::default())
    }
}

/// Roles with a default permission set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access to every category.
    Admin,
    /// Least-privilege member.
    User,
}

impl Role {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(PermissionParseError::UnknownRole {
                name: other.to_owned(),
            }),
        }
    }
}

/// Role-keyed default permission sets.
///
/// Built once at start-up and shared read-only (typically behind an `Arc`).
/// Resolution never mutates the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultPermissionTable {
    roles: BTreeMap<Role, PermissionSet>,
}

impl DefaultPermissionTable {
    /// The shipped defaults: admins get everything, users may only read
    /// events.
    #[must_use]
    pub fn standard() -> Self {
        let admin = ResourceCategory::ALL
            .into_iter()
            .fold(PermissionSet::default(), |set, resource| {
                set.with(resource, Capability::FULL)
            });
        let user = PermissionSet::default()
            .with(ResourceCategory::Events, Capability::READ_ONLY)
            .with(ResourceCategory::Accounting, Capability::NONE)
            .with(ResourceCategory::Admin, Capability::NONE);

        Self::from_roles([(Role::Admin, admin), (Role::User, user)])
    }

    /// Build a table from explicit entries. Roles left out resolve to an
    /// empty set.
    pub fn from_roles(entries: impl IntoIterator<Item = (Role, PermissionSet)>) -> Self {
        Self {
            roles: entries.into_iter().collect(),
        }
    }

    /// Copy of the default set for `role`.
    #[must_use]
    pub fn defaults_for_role(&self, role: Role) -> PermissionSet {
        self.roles.get(&role).cloned().unwrap_or_default()
    }

    /// Field-by-field override of `base`. Pure: `base` is left untouched.
    ///
    /// # Examples
    /// ```
    /// use gigbook_backend::domain::{
    ///     Action, CapabilityOverride, DefaultPermissionTable, PermissionOverride,
    ///     ResourceCategory, Role,
    /// };
    ///
    /// let table = DefaultPermissionTable::standard();
    /// let base = table.defaults_for_role(Role::User);
    /// let change = PermissionOverride::default().with(
    ///     ResourceCategory::Accounting,
    ///     CapabilityOverride { read: Some(true), ..CapabilityOverride::default() },
    /// );
    /// let widened = DefaultPermissionTable::apply_override(&base, &change);
    /// assert!(widened.allows(ResourceCategory::Accounting, Action::Read));
    /// assert!(!base.allows(ResourceCategory::Accounting, Action::Read));
    /// ```
    #[must_use]
    pub fn apply_override(base: &PermissionSet, change: &PermissionOverride) -> PermissionSet {
        change
            .0
            .iter()
            .fold(base.clone(), |set, (resource, field_change)| {
                let current = set.capability(*resource).unwrap_or(Capability::NONE);
                set.with(*resource, field_change.apply_to(current))
            })
    }

    /// Default set for `role` with `change` applied when present.
    #[must_use]
    pub fn resolve(&self, role: Role, change: Option<&PermissionOverride>) -> PermissionSet {
        let base = self.defaults_for_role(role);
        match change {
            Some(change) => Self::apply_override(&base, change),
            None => base,
        }
    }
}

impl Default for DefaultPermissionTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Persisted permission row: one boolean column per resource and action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    /// Owner of the record.
    pub user_id: UserId,
    /// `events.read`.
    pub events_read: bool,
    /// `events.write`.
    pub events_write: bool,
    /// `events.delete`.
    pub events_delete: bool,
    /// `accounting.read`.
    pub accounting_read: bool,
    /// `accounting.write`.
    pub accounting_write: bool,
    /// `accounting.delete`.
    pub accounting_delete: bool,
    /// `admin.read`.
    pub admin_read: bool,
    /// `admin.write`.
    pub admin_write: bool,
    /// `admin.delete`.
    pub admin_delete: bool,
}

impl PermissionRecord {
    /// Flatten `set` into a record; absent categories become all-false
    /// columns.
    #[must_use]
    pub fn from_set(user_id: UserId, set: &PermissionSet) -> Self {
        let events = set.capability(ResourceCategory::Events).unwrap_or_default();
        let accounting = set.capability(ResourceCategory::Accounting).unwrap_or_default();
        let admin = set.capability(ResourceCategory::Admin).unwrap_or_default();
        Self {
            user_id,
            events_read: events.read,
            events_write: events.write,
            events_delete: events.delete,
            accounting_read: accounting.read,
            accounting_write: accounting.write,
            accounting_delete: accounting.delete,
            admin_read: admin.read,
            admin_write: admin.write,
            admin_delete: admin.delete,
        }
    }

    /// Rebuild the permission set stored in this record.
    #[must_use]
    pub fn to_set(&self) -> PermissionSet {
        PermissionSet::default()
            .with(
                ResourceCategory::Events,
                Capability {
                    read: self.events_read,
                    write: self.events_write,
                    delete: self.events_delete,
                },
            )
            .with(
                ResourceCategory::Accounting,
                Capability {
                    read: self.accounting_read,
                    write: self.accounting_write,
                    delete: self.accounting_delete,
                },
            )
            .with(
                ResourceCategory::Admin,
                Capability {
                    read: self.admin_read,
                    write: self.admin_write,
                    delete: self.admin_delete,
                },
            )
    }
}

/// Errors raised while reading invitation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvitationError {
    /// Metadata did not have the expected shape.
    #[error("malformed invitation metadata: {message}")]
    Malformed { message: String },
}

/// Permission-relevant part of an invitation's metadata.
///
/// Unrelated metadata keys are ignored; unknown roles, categories, or
/// capability fields are rejected.
///
/// # Examples
/// ```
/// use gigbook_backend::domain::{InvitationMetadata, Role};
/// use serde_json::json;
///
/// let metadata = InvitationMetadata::from_value(json!({
///     "role": "user",
///     "invited_by": "ops@example.org",
///     "permissions": { "accounting": { "read": true } }
/// }))
/// .unwrap();
/// assert_eq!(metadata.role, Role::User);
/// assert!(metadata.permissions.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationMetadata {
    /// Role whose defaults seed the permission set.
    pub role: Role,
    /// Optional inviter override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PermissionOverride>,
}

impl InvitationMetadata {
    /// Parse from the raw JSON metadata attached to an invitation.
    pub fn from_value(value: Value) -> Result<Self, InvitationError> {
        serde_json::from_value(value).map_err(|err| InvitationError::Malformed {
            message: err.to_string(),
        })
    }
}
