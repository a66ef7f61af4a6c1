//! Per-user capability lookups used to fail fast before store calls.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::{
    Action, DefaultPermissionTable, PermissionOverride, PermissionSet, ResourceCategory, Role,
    UserId,
};

/// Resolved permission sets keyed by user, plus the shared default table.
///
/// Lookups fail closed: an unknown user or an absent category denies every
/// action. The default table is shared immutably; only the per-user map is
/// written, and only by invitation acceptance, login hydration, or an
/// administrative update.
#[derive(Debug)]
pub struct PermissionModel {
    defaults: Arc<DefaultPermissionTable>,
    assignments: RwLock<HashMap<UserId, PermissionSet>>,
}

impl PermissionModel {
    /// Model with no assigned users.
    pub fn new(defaults: Arc<DefaultPermissionTable>) -> Self {
        Self {
            defaults,
            assignments: RwLock::new(HashMap::new()),
        }
    }

    /// Shared default table.
    pub fn defaults(&self) -> &DefaultPermissionTable {
        &self.defaults
    }

    /// Whether `user` may perform `action` on `resource`.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use gigbook_backend::domain::{
    ///     Action, DefaultPermissionTable, PermissionModel, ResourceCategory, Role, UserId,
    /// };
    ///
    /// let model = PermissionModel::new(Arc::new(DefaultPermissionTable::standard()));
    /// let user = UserId::random();
    /// assert!(!model.check(&user, ResourceCategory::Events, Action::Read));
    ///
    /// model.assign(user.clone(), model.defaults_for_role(Role::User));
    /// assert!(model.check(&user, ResourceCategory::Events, Action::Read));
    /// assert!(!model.check(&user, ResourceCategory::Accounting, Action::Write));
    /// ```
    pub fn check(&self, user: &UserId, resource: ResourceCategory, action: Action) -> bool {
        let assignments = self
            .assignments
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let allowed = assignments
            .get(user)
            .is_some_and(|set| set.allows(resource, action));
        if !allowed {
            debug!(%user, %resource, %action, "permission check denied");
        }
        allowed
    }

    /// Copy of the default set for `role`.
    pub fn defaults_for_role(&self, role: Role) -> PermissionSet {
        self.defaults.defaults_for_role(role)
    }

    /// Field-by-field override of `base`; the default table is untouched.
    pub fn apply_override(
        &self,
        base: &PermissionSet,
        change: &PermissionOverride,
    ) -> PermissionSet {
        DefaultPermissionTable::apply_override(base, change)
    }

    /// Register `set` for `user`, returning the set it replaced.
    pub fn assign(&self, user: UserId, set: PermissionSet) -> Option<PermissionSet> {
        self.assignments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user, set)
    }

    /// Current set for `user`, if one is registered.
    pub fn permission_set(&self, user: &UserId) -> Option<PermissionSet> {
        self.assignments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user)
            .cloned()
    }

    /// Drop the in-memory set for `user` (for example at logout).
    pub fn forget(&self, user: &UserId) -> Option<PermissionSet> {
        self.assignments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user)
    }
}

impl Default for PermissionModel {
    fn default() -> Self {
        Self::new(Arc::new(DefaultPermissionTable::standard()))
    }
}

#[cfg(test)]
mod tests {
    //! Fail-closed lookups and role scenarios.
    use super::*;
    use rstest::{fixture, rstest};
    use rstest_bdd_macros::{given, then, when};

    use crate::domain::{Capability, CapabilityOverride};

    #[fixture]
    fn model() -> PermissionModel {
        PermissionModel::default()
    }

    #[derive(Debug, Clone)]
    struct CheckRequest {
        model: Arc<PermissionModel>,
        user: UserId,
        resource: ResourceCategory,
        action: Action,
    }

    #[given("a user holding the default user-role permissions")]
    fn a_default_user() -> (Arc<PermissionModel>, UserId) {
        let model = Arc::new(PermissionModel::default());
        let user = UserId::random();
        model.assign(user.clone(), model.defaults_for_role(Role::User));
        (model, user)
    }

    #[when("the model checks the requested capability")]
    fn the_model_checks(request: CheckRequest) -> bool {
        request
            .model
            .check(&request.user, request.resource, request.action)
    }

    #[then("the check matches the role table")]
    fn the_check_matches(outcome: (bool, bool)) {
        assert_eq!(outcome.0, outcome.1);
    }

    #[rstest]
    #[case(ResourceCategory::Accounting, Action::Write, false)]
    #[case(ResourceCategory::Events, Action::Read, true)]
    #[case(ResourceCategory::Events, Action::Delete, false)]
    fn default_user_scenarios(
        #[case] resource: ResourceCategory,
        #[case] action: Action,
        #[case] expected: bool,
    ) {
        let (model, user) = a_default_user();
        let answer = the_model_checks(CheckRequest {
            model,
            user,
            resource,
            action,
        });
        the_check_matches((answer, expected));
    }

    #[rstest]
    fn unknown_users_are_denied_everything(model: PermissionModel) {
        let stranger = UserId::random();
        for resource in ResourceCategory::ALL {
            for action in Action::ALL {
                assert!(!model.check(&stranger, resource, action));
            }
        }
    }

    #[rstest]
    fn absent_categories_are_denied_for_every_action(model: PermissionModel) {
        let user = UserId::random();
        model.assign(
            user.clone(),
            PermissionSet::default().with(ResourceCategory::Events, Capability::FULL),
        );
        for action in Action::ALL {
            assert!(!model.check(&user, ResourceCategory::Accounting, action));
            assert!(!model.check(&user, ResourceCategory::Admin, action));
        }
    }

    #[rstest]
    fn overrides_do_not_leak_into_other_users(model: PermissionModel) {
        let widened_user = UserId::random();
        let plain_user = UserId::random();
        let base = model.defaults_for_role(Role::User);
        let widened = model.apply_override(
            &base,
            &PermissionOverride::default().with(
                ResourceCategory::Accounting,
                CapabilityOverride {
                    read: Some(true),
                    ..CapabilityOverride::default()
                },
            ),
        );
        model.assign(widened_user.clone(), widened);
        model.assign(plain_user.clone(), model.defaults_for_role(Role::User));

        assert!(model.check(&widened_user, ResourceCategory::Accounting, Action::Read));
        assert!(!model.check(&plain_user, ResourceCategory::Accounting, Action::Read));
        assert_eq!(model.defaults_for_role(Role::User), base);
    }

    #[rstest]
    fn assign_returns_the_replaced_set(model: PermissionModel) {
        let user = UserId::random();
        assert_eq!(model.assign(user.clone(), model.defaults_for_role(Role::User)), None);
        let previous = model.assign(user.clone(), model.defaults_for_role(Role::Admin));
        assert_eq!(previous, Some(model.defaults_for_role(Role::User)));
        assert_eq!(model.permission_set(&user), Some(model.defaults_for_role(Role::Admin)));
    }

    #[rstest]
    fn forgotten_users_fall_back_to_deny(model: PermissionModel) {
        let user = UserId::random();
        model.assign(user.clone(), model.defaults_for_role(Role::Admin));
        model.forget(&user);
        assert!(!model.check(&user, ResourceCategory::Events, Action::Read));
    }
}
