//! Assigns and maintains persisted permission sets.
//!
//! A user's set is fixed when their invitation is accepted and only changes
//! through an explicit administrative update. Both paths write the persisted
//! record first and then register the set with the in-memory model.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::info;

use super::ports::{PermissionRecordError, PermissionRecordRepository};
use super::{
    Action, InvitationError, InvitationMetadata, PermissionModel, PermissionOverride,
    PermissionRecord, PermissionSet, ResourceCategory, UserId,
};

/// Failures raised while assigning permissions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionAssignmentError {
    /// The invitation for this user was already accepted.
    #[error("permissions already assigned to user {user_id}")]
    AlreadyAssigned { user_id: UserId },
    /// The user has no persisted permission record.
    #[error("no permissions assigned to user {user_id}")]
    NotAssigned { user_id: UserId },
    /// The acting user may not administer permissions.
    #[error("user {actor} may not change permissions")]
    Forbidden { actor: UserId },
    /// Invitation metadata could not be read.
    #[error(transparent)]
    Invitation(#[from] InvitationError),
    /// The repository failed.
    #[error(transparent)]
    Repository(#[from] PermissionRecordError),
}

/// Invitation acceptance, administrative updates, and login hydration.
pub struct PermissionAssignmentService {
    repository: Arc<dyn PermissionRecordRepository>,
    model: Arc<PermissionModel>,
}

impl PermissionAssignmentService {
    /// Service writing through `repository` and registering with `model`.
    pub fn new(
        repository: Arc<dyn PermissionRecordRepository>,
        model: Arc<PermissionModel>,
    ) -> Self {
        Self { repository, model }
    }

    /// Resolve and persist the set for a newly accepted invitation.
    ///
    /// `metadata` is the raw JSON attached to the invitation. Accepting twice
    /// for the same user fails with
    /// [`PermissionAssignmentError::AlreadyAssigned`].
    pub async fn accept_invitation(
        &self,
        user: &UserId,
        metadata: Value,
    ) -> Result<PermissionSet, PermissionAssignmentError> {
        let invitation = InvitationMetadata::from_value(metadata)?;
        if self.repository.find(user).await?.is_some() {
            return Err(PermissionAssignmentError::AlreadyAssigned {
                user_id: user.clone(),
            });
        }

        let set = self
            .model
            .defaults()
            .resolve(invitation.role, invitation.permissions.as_ref());
        let record = PermissionRecord::from_set(user.clone(), &set);
        self.repository
            .insert(&record)
            .await
            .map_err(|err| match err {
                PermissionRecordError::Duplicate { .. } => PermissionAssignmentError::AlreadyAssigned {
                    user_id: user.clone(),
                },
                other => other.into(),
            })?;

        self.model.assign(user.clone(), set.clone());
        info!(%user, role = %invitation.role, "permissions assigned from invitation");
        Ok(set)
    }

    /// Apply `change` to `target`'s stored set on behalf of `actor`.
    ///
    /// The actor needs `admin.write`.
    pub async fn update_permissions(
        &self,
        actor: &UserId,
        target: &UserId,
        change: &PermissionOverride,
    ) -> Result<PermissionSet, PermissionAssignmentError> {
        if !self.model.check(actor, ResourceCategory::Admin, Action::Write) {
            return Err(PermissionAssignmentError::Forbidden {
                actor: actor.clone(),
            });
        }
        let current = self
            .repository
            .find(target)
            .await?
            .ok_or_else(|| PermissionAssignmentError::NotAssigned {
                user_id: target.clone(),
            })?;

        let updated = self.model.apply_override(&current.to_set(), change);
        self.repository
            .update(&PermissionRecord::from_set(target.clone(), &updated))
            .await?;
        self.model.assign(target.clone(), updated.clone());
        info!(%actor, %target, "permissions updated by administrator");
        Ok(updated)
    }

    /// Register `user`'s stored set with the model, typically at login.
    ///
    /// Returns `None` when the user has no record; the model then keeps
    /// denying everything for them.
    pub async fn load_user(
        &self,
        user: &UserId,
    ) -> Result<Option<PermissionSet>, PermissionAssignmentError> {
        let Some(record) = self.repository.find(user).await? else {
            return Ok(None);
        };
        let set = record.to_set();
        self.model.assign(user.clone(), set.clone());
        Ok(Some(set))
    }
}
