//! Session/profile fetch and the facts resolution pipeline.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::warn;

use storekeep_auth::{
    AuthorStanding, AuthorizationFacts, CustomRoleGrant, FactsUnavailableError,
    PermissionSnapshot, UserRecord, facts_or_deny, resolve_facts,
};
use storekeep_core::UserId;

use crate::locations::LocationDirectory;
use crate::store::{CustomRoleStore, RoleAssignments};

/// What the session/profile query returns for a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProfile {
    pub user: UserRecord,
    pub snapshot: Option<PermissionSnapshot>,
}

/// Black-box session/profile query.
pub trait FactsSource: Send + Sync {
    fn fetch(&self, user: UserId) -> Result<SessionProfile, FactsUnavailableError>;
}

impl<F> FactsSource for Arc<F>
where
    F: FactsSource + ?Sized,
{
    fn fetch(&self, user: UserId) -> Result<SessionProfile, FactsUnavailableError> {
        (**self).fetch(user)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryFactsSource {
    inner: RwLock<HashMap<UserId, SessionProfile>>,
}

impl InMemoryFactsSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, profile: SessionProfile) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(profile.user.user_id, profile);
        }
    }
}

impl FactsSource for InMemoryFactsSource {
    fn fetch(&self, user: UserId) -> Result<SessionProfile, FactsUnavailableError> {
        let map = self
            .inner
            .read()
            .map_err(|_| FactsUnavailableError("profile source poisoned".to_string()))?;
        map.get(&user)
            .cloned()
            .ok_or_else(|| FactsUnavailableError(format!("no profile for user {user}")))
    }
}

/// Composes the profile fetch, assignments and custom-role store into facts.
pub struct FactsResolver<F, S, A> {
    source: F,
    store: S,
    assignments: A,
}

impl<F, S, A> FactsResolver<F, S, A>
where
    F: FactsSource,
    S: CustomRoleStore,
    A: RoleAssignments,
{
    pub fn new(source: F, store: S, assignments: A) -> Self {
        Self {
            source,
            store,
            assignments,
        }
    }

    /// Resolve facts, surfacing failures as "facts unavailable".
    pub fn try_resolve(&self, user: UserId) -> Result<AuthorizationFacts, FactsUnavailableError> {
        let profile = self.source.fetch(user)?;

        let mut grants: Vec<CustomRoleGrant> = Vec::new();
        for id in self.assignments.roles_for_user(user) {
            let role = self
                .store
                .get(id)
                .map_err(|e| FactsUnavailableError(e.to_string()))?;
            // assignments may outlive a deleted role
            if let Some(role) = role {
                grants.push(role.as_grant());
            }
        }

        Ok(resolve_facts(&profile.user, profile.snapshot.as_ref(), &grants))
    }

    /// Fail-closed resolution: any failure yields deny-all facts.
    pub fn resolve(&self, user: UserId) -> AuthorizationFacts {
        let result = self.try_resolve(user);
        if let Err(e) = &result {
            warn!(user_id = %user, error = %e, "facts resolution failed");
        }
        facts_or_deny(result)
    }

    /// Facts plus authoring standing for `user`.
    pub fn author<D: LocationDirectory>(&self, user: UserId, directory: &D) -> Author {
        let facts = self.resolve(user);
        let standing =
            AuthorStanding::resolve(&facts, &directory.headed_by(user), |l| directory.is_root(l));
        Author {
            user_id: user,
            facts,
            standing,
        }
    }
}

/// An authenticated custom-role author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub user_id: UserId,
    pub facts: AuthorizationFacts,
    pub standing: AuthorStanding,
}
