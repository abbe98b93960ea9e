use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use storekeep_core::{CustomRoleId, UserId};

/// user ↔ custom role relation.
///
/// Assignment does not check base-role requirements; mismatched grants are
/// skipped when facts are resolved.
pub trait RoleAssignments: Send + Sync {
    fn assign(&self, user: UserId, role: CustomRoleId);
    fn unassign(&self, user: UserId, role: CustomRoleId);
    fn roles_for_user(&self, user: UserId) -> Vec<CustomRoleId>;
    fn users_with_role(&self, role: CustomRoleId) -> Vec<UserId>;
}

impl<A> RoleAssignments for Arc<A>
where
    A: RoleAssignments + ?Sized,
{
    fn assign(&self, user: UserId, role: CustomRoleId) {
        (**self).assign(user, role)
    }

    fn unassign(&self, user: UserId, role: CustomRoleId) {
        (**self).unassign(user, role)
    }

    fn roles_for_user(&self, user: UserId) -> Vec<CustomRoleId> {
        (**self).roles_for_user(user)
    }

    fn users_with_role(&self, role: CustomRoleId) -> Vec<UserId> {
        (**self).users_with_role(role)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRoleAssignments {
    inner: RwLock<HashMap<UserId, BTreeSet<CustomRoleId>>>,
}

impl InMemoryRoleAssignments {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoleAssignments for InMemoryRoleAssignments {
    fn assign(&self, user: UserId, role: CustomRoleId) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(user).or_default().insert(role);
        }
    }

    fn unassign(&self, user: UserId, role: CustomRoleId) {
        if let Ok(mut map) = self.inner.write() {
            if let Some(roles) = map.get_mut(&user) {
                roles.remove(&role);
            }
        }
    }

    fn roles_for_user(&self, user: UserId) -> Vec<CustomRoleId> {
        match self.inner.read() {
            Ok(map) => map.get(&user).map(|r| r.iter().copied().collect()).unwrap_or_default(),
            Err(_) => vec![],
        }
    }

    fn users_with_role(&self, role: CustomRoleId) -> Vec<UserId> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };
        let mut users: Vec<UserId> = map
            .iter()
            .filter_map(|(u, roles)| roles.contains(&role).then_some(*u))
            .collect();
        users.sort();
        users
    }
}
