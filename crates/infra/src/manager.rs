//! Custom Role Lifecycle Manager.
//!
//! Orchestrates one authoring attempt:
//!
//! ```text
//! command
//!   ↓
//! 1. authorize the author (can_manage_roles)
//!   ↓
//! 2. load the current record (if any)
//!   ↓
//! 3. aggregate.handle → validation against the constraint engine
//!   ↓
//! 4. expected version must match; location must exist in the directory
//!   ↓
//! 5. apply events, persist with an exact-version check (all-or-nothing)
//! ```
//!
//! Nothing is written unless every step succeeds.

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

use storekeep_auth::custom_role::{CreateCustomRole, DeleteCustomRole, ReplaceCustomRole};
use storekeep_auth::{
    AuthoringPolicy, AuthzError, CustomRole, CustomRoleCommand, CustomRoleDraft, CustomRoleError,
    CustomRoleEvent, ValidationError, authorize_command,
};
use storekeep_core::{Aggregate, AggregateRoot, CustomRoleId, DomainError, ExpectedVersion, LocationId};
use storekeep_events::EventEnvelope;

use crate::facts_source::Author;
use crate::locations::LocationDirectory;
use crate::store::{CustomRoleFilter, CustomRoleStore, StoreError};

pub const CUSTOM_ROLE_STREAM: &str = "auth.custom_role";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManagerError {
    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("location {0} is not in the location directory")]
    UnknownLocation(LocationId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CustomRoleError> for ManagerError {
    fn from(value: CustomRoleError) -> Self {
        match value {
            CustomRoleError::Validation(e) => ManagerError::Validation(e),
            CustomRoleError::Domain(e) => ManagerError::Domain(e),
        }
    }
}

/// Result of a committed command.
#[derive(Debug, Clone)]
pub struct Committed {
    /// State after the command (for deletes: the final, deleted state).
    pub role: CustomRole,
    pub events: Vec<EventEnvelope<CustomRoleEvent>>,
}

pub struct CustomRoleManager<S, L> {
    store: S,
    locations: L,
    policy: AuthoringPolicy,
}

impl<S, L> CustomRoleManager<S, L>
where
    S: CustomRoleStore,
    L: LocationDirectory,
{
    pub fn new(store: S, locations: L, policy: AuthoringPolicy) -> Self {
        Self {
            store,
            locations,
            policy,
        }
    }

    pub fn policy(&self) -> AuthoringPolicy {
        self.policy
    }

    pub fn create(&self, author: &Author, draft: CustomRoleDraft) -> Result<Committed, ManagerError> {
        let id = CustomRoleId::new();
        let command = CustomRoleCommand::Create(CreateCustomRole {
            id,
            draft,
            author: author.standing,
            policy: self.policy,
            occurred_at: Utc::now(),
        });
        self.execute(author, command, ExpectedVersion::Absent)
    }

    /// Replace the full definition of `id`.
    ///
    /// `expected` is the version the author edited; a newer stored version
    /// fails with a conflict and nothing is written.
    pub fn replace(
        &self,
        author: &Author,
        id: CustomRoleId,
        expected: ExpectedVersion,
        draft: CustomRoleDraft,
    ) -> Result<Committed, ManagerError> {
        let command = CustomRoleCommand::Replace(ReplaceCustomRole {
            id,
            draft,
            author: author.standing,
            policy: self.policy,
            occurred_at: Utc::now(),
        });
        self.execute(author, command, expected)
    }

    pub fn delete(
        &self,
        author: &Author,
        id: CustomRoleId,
        expected: ExpectedVersion,
    ) -> Result<Committed, ManagerError> {
        let command = CustomRoleCommand::Delete(DeleteCustomRole {
            id,
            occurred_at: Utc::now(),
        });
        self.execute(author, command, expected)
    }

    pub fn get(&self, id: CustomRoleId) -> Result<Option<CustomRole>, ManagerError> {
        Ok(self.store.get(id)?)
    }

    pub fn list(&self, filter: &CustomRoleFilter) -> Result<Vec<CustomRole>, ManagerError> {
        Ok(self.store.list(filter)?)
    }

    fn execute(
        &self,
        author: &Author,
        command: CustomRoleCommand,
        expected: ExpectedVersion,
    ) -> Result<Committed, ManagerError> {
        let id = command.id();

        authorize_command(&author.facts, &command)?;

        let mut role = self
            .store
            .get(id)?
            .unwrap_or_else(|| CustomRole::empty(id));
        let loaded = role.created.then_some(role.version());

        let events = match role.handle(&command) {
            Ok(events) => events,
            Err(e) => {
                info!(custom_role_id = %id, author = %author.user_id, error = %e, "custom role command rejected");
                return Err(e.into());
            }
        };
        expected.check(loaded)?;

        for event in &events {
            role.apply(event);
        }

        if !role.deleted {
            if let Some(location) = role.location {
                if !self.locations.contains(location) {
                    return Err(ManagerError::UnknownLocation(location));
                }
            }
        }

        let store_expected = match loaded {
            Some(v) => ExpectedVersion::Exact(v),
            None => ExpectedVersion::Absent,
        };
        if role.deleted {
            self.store.delete(id, store_expected)?;
        } else {
            self.store.save(role.clone(), store_expected)?;
        }

        let base = loaded.unwrap_or(0);
        let events: Vec<EventEnvelope<CustomRoleEvent>> = events
            .into_iter()
            .enumerate()
            .map(|(i, e)| EventEnvelope::wrap(*id.as_uuid(), CUSTOM_ROLE_STREAM, base + i as u64 + 1, e))
            .collect();

        for envelope in &events {
            debug!(custom_role_id = %id, event_type = envelope.event_type(), sequence = envelope.sequence_number(), "custom role event committed");
        }
        info!(custom_role_id = %id, author = %author.user_id, version = role.version(), "custom role committed");

        Ok(Committed { role, events })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locations::{InMemoryLocationDirectory, Location};
    use crate::store::InMemoryCustomRoleStore;
    use storekeep_auth::{AuthorStanding, AuthorizationFacts, PermissionKey, Role};
    use storekeep_core::UserId;

    fn setup() -> (CustomRoleManager<InMemoryCustomRoleStore, InMemoryLocationDirectory>, LocationId) {
        let dir = InMemoryLocationDirectory::new();
        let location = LocationId::new();
        dir.upsert(Location::root(location, "Central Store"));
        let manager = CustomRoleManager::new(
            InMemoryCustomRoleStore::new(),
            dir,
            AuthoringPolicy::default(),
        );
        (manager, location)
    }

    fn superuser() -> Author {
        Author {
            user_id: UserId::new(),
            facts: AuthorizationFacts::superuser(),
            standing: AuthorStanding::Superuser,
        }
    }

    #[test]
    fn author_without_manage_roles_is_forbidden() {
        let (manager, location) = setup();
        let author = Author {
            user_id: UserId::new(),
            facts: AuthorizationFacts::default().with_role(Role::LocationHead),
            standing: AuthorStanding::Ordinary,
        };
        let draft = CustomRoleDraft::new("Clerk", location).with_grants([PermissionKey::ViewReports]);
        assert!(matches!(
            manager.create(&author, draft),
            Err(ManagerError::Forbidden(_))
        ));
        assert!(manager.list(&CustomRoleFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn unknown_location_is_not_saved() {
        let (manager, _) = setup();
        let draft = CustomRoleDraft::new("Clerk", LocationId::new())
            .with_grants([PermissionKey::ViewReports]);
        assert!(matches!(
            manager.create(&superuser(), draft),
            Err(ManagerError::UnknownLocation(_))
        ));
        assert!(manager.list(&CustomRoleFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn create_emits_first_event() {
        let (manager, location) = setup();
        let draft = CustomRoleDraft::new("Clerk", location).with_grants([PermissionKey::ViewReports]);
        let committed = manager.create(&superuser(), draft).unwrap();

        assert_eq!(committed.role.version, 1);
        assert_eq!(committed.events.len(), 1);
        assert_eq!(committed.events[0].event_type(), "auth.custom_role.created");
        assert_eq!(committed.events[0].sequence_number(), 1);
        assert_eq!(committed.events[0].stream_type(), CUSTOM_ROLE_STREAM);
    }

    #[test]
    fn stale_replace_conflicts() {
        let (manager, location) = setup();
        let author = superuser();
        let draft = CustomRoleDraft::new("Clerk", location).with_grants([PermissionKey::ViewReports]);
        let id = manager.create(&author, draft.clone()).unwrap().role.id;

        manager
            .replace(&author, id, ExpectedVersion::Exact(1), draft.clone())
            .unwrap();
        assert!(matches!(
            manager.replace(&author, id, ExpectedVersion::Exact(1), draft),
            Err(ManagerError::Domain(DomainError::Conflict(_)))
        ));
    }
}
