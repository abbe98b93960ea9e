//! Custom role lifecycle: draft validation and the custom-role aggregate.
//!
//! A custom role is created, replaced wholesale (metadata and grant set
//! together, there is no delta update), or deleted. Every create/replace is
//! validated against the Role Constraint Engine for the acting author.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storekeep_core::{Aggregate, AggregateRoot, CustomRoleId, DomainError, LocationId};
use storekeep_events::Event;

use crate::constraints::{
    AuthoringPolicy, UnassignablePolicy, any_role_restricted, is_grantable, profile_for,
};
use crate::{AuthorStanding, CommandAuthorization, CustomRoleGrant, PermissionKey, Role};

// ─────────────────────────────────────────────────────────────────────────────
// Draft & validation
// ─────────────────────────────────────────────────────────────────────────────

/// Author-submitted definition of a custom role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRoleDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub location: Option<LocationId>,
    /// `None` means the role may be assigned on top of any base role.
    #[serde(default)]
    pub requires_base_role: Option<Role>,
    pub is_active: bool,
    pub permission_grants: BTreeSet<PermissionKey>,
}

impl CustomRoleDraft {
    pub fn new(name: impl Into<String>, location: LocationId) -> Self {
        Self {
            name: name.into(),
            description: None,
            location: Some(location),
            requires_base_role: None,
            is_active: true,
            permission_grants: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn requiring(mut self, role: Role) -> Self {
        self.requires_base_role = Some(role);
        self
    }

    pub fn with_grants<I: IntoIterator<Item = PermissionKey>>(mut self, keys: I) -> Self {
        self.permission_grants.extend(keys);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// User-correctable authoring errors, reported in rule order.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("custom role name must not be empty")]
    EmptyName,

    #[error("custom role must be scoped to a location")]
    MissingLocation,

    #[error("custom role must grant at least one permission")]
    NoPermissions,

    #[error("permission '{0}' cannot be granted by this author")]
    UnassignablePermission(PermissionKey),
}

/// A draft that passed validation, normalized for persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDraft {
    pub name: String,
    pub description: Option<String>,
    pub location: LocationId,
    pub requires_base_role: Option<Role>,
    pub is_active: bool,
    pub grants: BTreeSet<PermissionKey>,
    /// Keys removed under [`UnassignablePolicy::Strip`].
    pub stripped: BTreeSet<PermissionKey>,
}

pub type ValidationResult = Result<ValidatedDraft, ValidationError>;

/// Validate `draft` for `author`. Rules run in order; the first failure wins:
///
/// 1. trimmed name non-empty
/// 2. location present
/// 3. at least one grant
/// 4. every grant is permitted for the base-role requirement and author
///
/// Base permissions of the required role are accepted as-is: they are the
/// locked-on entries an author cannot uncheck.
pub fn validate(
    draft: &CustomRoleDraft,
    author: AuthorStanding,
    policy: AuthoringPolicy,
) -> ValidationResult {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    let location = draft.location.ok_or(ValidationError::MissingLocation)?;

    if draft.permission_grants.is_empty() {
        return Err(ValidationError::NoPermissions);
    }

    let any_role_restrictions = match draft.requires_base_role {
        Some(_) => BTreeSet::new(),
        None => any_role_restricted(policy.any_role),
    };
    let permitted = |key: PermissionKey| match draft.requires_base_role {
        Some(role) => profile_for(role).base.contains(&key) || is_grantable(role, key, author),
        None => author.is_elevated() || !any_role_restrictions.contains(&key),
    };

    let (grants, stripped): (BTreeSet<PermissionKey>, BTreeSet<PermissionKey>) =
        draft.permission_grants.iter().partition(|k| permitted(**k));

    if let Some(&first) = stripped.iter().next() {
        match policy.unassignable {
            UnassignablePolicy::Reject => {
                return Err(ValidationError::UnassignablePermission(first));
            }
            UnassignablePolicy::Strip if grants.is_empty() => {
                return Err(ValidationError::NoPermissions);
            }
            UnassignablePolicy::Strip => {}
        }
    }

    let description = draft
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    Ok(ValidatedDraft {
        name: name.to_string(),
        description,
        location,
        requires_base_role: draft.requires_base_role,
        is_active: draft.is_active,
        grants,
        stripped,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate
// ─────────────────────────────────────────────────────────────────────────────

/// Custom role aggregate (also the persisted record).
///
/// # Invariants
/// - Name, location and grants are never empty once created.
/// - Replacing swaps every field at once.
/// - A deleted role accepts no further commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRole {
    pub id: CustomRoleId,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<LocationId>,
    pub requires_base_role: Option<Role>,
    pub is_active: bool,
    pub grants: BTreeSet<PermissionKey>,
    pub version: u64,
    pub created: bool,
    pub deleted: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CustomRole {
    pub fn empty(id: CustomRoleId) -> Self {
        Self {
            id,
            name: String::new(),
            description: None,
            location: None,
            requires_base_role: None,
            is_active: false,
            grants: BTreeSet::new(),
            version: 0,
            created: false,
            deleted: false,
            updated_at: None,
        }
    }

    /// View consumed by the Role Resolver. Deleted roles never apply.
    pub fn as_grant(&self) -> CustomRoleGrant {
        CustomRoleGrant {
            id: self.id,
            requires_base_role: self.requires_base_role,
            is_active: self.is_active && self.created && !self.deleted,
            grants: self.grants.clone(),
        }
    }

    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        if self.deleted {
            return Err(DomainError::invariant("custom role is deleted"));
        }
        Ok(())
    }
}

impl AggregateRoot for CustomRole {
    type Id = CustomRoleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomRole {
    pub id: CustomRoleId,
    pub draft: CustomRoleDraft,
    pub author: AuthorStanding,
    pub policy: AuthoringPolicy,
    pub occurred_at: DateTime<Utc>,
}

/// Full replacement of metadata and grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceCustomRole {
    pub id: CustomRoleId,
    pub draft: CustomRoleDraft,
    pub author: AuthorStanding,
    pub policy: AuthoringPolicy,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteCustomRole {
    pub id: CustomRoleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CustomRoleCommand {
    Create(CreateCustomRole),
    Replace(ReplaceCustomRole),
    Delete(DeleteCustomRole),
}

impl CustomRoleCommand {
    pub fn id(&self) -> CustomRoleId {
        match self {
            CustomRoleCommand::Create(c) => c.id,
            CustomRoleCommand::Replace(c) => c.id,
            CustomRoleCommand::Delete(c) => c.id,
        }
    }
}

impl CommandAuthorization for CustomRoleCommand {
    fn required_permissions(&self) -> &[PermissionKey] {
        &[PermissionKey::ManageRoles]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Complete definition carried by create/replace events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRoleDefinition {
    pub name: String,
    pub description: Option<String>,
    pub location: LocationId,
    pub requires_base_role: Option<Role>,
    pub is_active: bool,
    pub grants: BTreeSet<PermissionKey>,
}

impl From<ValidatedDraft> for CustomRoleDefinition {
    fn from(v: ValidatedDraft) -> Self {
        Self {
            name: v.name,
            description: v.description,
            location: v.location,
            requires_base_role: v.requires_base_role,
            is_active: v.is_active,
            grants: v.grants,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRoleCreated {
    pub id: CustomRoleId,
    pub definition: CustomRoleDefinition,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRoleReplaced {
    pub id: CustomRoleId,
    pub definition: CustomRoleDefinition,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRoleDeleted {
    pub id: CustomRoleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomRoleEvent {
    Created(CustomRoleCreated),
    Replaced(CustomRoleReplaced),
    Deleted(CustomRoleDeleted),
}

impl Event for CustomRoleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CustomRoleEvent::Created(_) => "auth.custom_role.created",
            CustomRoleEvent::Replaced(_) => "auth.custom_role.replaced",
            CustomRoleEvent::Deleted(_) => "auth.custom_role.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CustomRoleEvent::Created(e) => e.occurred_at,
            CustomRoleEvent::Replaced(e) => e.occurred_at,
            CustomRoleEvent::Deleted(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CustomRoleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for CustomRole {
    type Command = CustomRoleCommand;
    type Event = CustomRoleEvent;
    type Error = CustomRoleError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CustomRoleEvent::Created(e) => {
                self.id = e.id;
                self.created = true;
                self.apply_definition(&e.definition, e.occurred_at);
            }
            CustomRoleEvent::Replaced(e) => self.apply_definition(&e.definition, e.occurred_at),
            CustomRoleEvent::Deleted(e) => {
                self.deleted = true;
                self.is_active = false;
                self.updated_at = Some(e.occurred_at);
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CustomRoleCommand::Create(cmd) => self.handle_create(cmd),
            CustomRoleCommand::Replace(cmd) => self.handle_replace(cmd),
            CustomRoleCommand::Delete(cmd) => self.handle_delete(cmd),
        }
    }
}

impl CustomRole {
    fn handle_create(&self, cmd: &CreateCustomRole) -> Result<Vec<CustomRoleEvent>, CustomRoleError> {
        if self.created {
            return Err(DomainError::invariant("custom role already exists").into());
        }

        let validated = validate(&cmd.draft, cmd.author, cmd.policy)?;

        Ok(vec![CustomRoleEvent::Created(CustomRoleCreated {
            id: cmd.id,
            definition: validated.into(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_replace(&self, cmd: &ReplaceCustomRole) -> Result<Vec<CustomRoleEvent>, CustomRoleError> {
        self.ensure_live()?;

        let validated = validate(&cmd.draft, cmd.author, cmd.policy)?;

        Ok(vec![CustomRoleEvent::Replaced(CustomRoleReplaced {
            id: cmd.id,
            definition: validated.into(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteCustomRole) -> Result<Vec<CustomRoleEvent>, CustomRoleError> {
        self.ensure_live()?;

        Ok(vec![CustomRoleEvent::Deleted(CustomRoleDeleted {
            id: cmd.id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn apply_definition(&mut self, d: &CustomRoleDefinition, at: DateTime<Utc>) {
        self.name = d.name.clone();
        self.description = d.description.clone();
        self.location = Some(d.location);
        self.requires_base_role = d.requires_base_role;
        self.is_active = d.is_active;
        self.grants = d.grants.clone();
        self.updated_at = Some(at);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use PermissionKey::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn stock_draft() -> CustomRoleDraft {
        CustomRoleDraft::new("Senior Storekeeper", LocationId::new())
            .requiring(Role::StockIncharge)
            .with_grants([IssueStock, FillCentralRegister])
    }

    #[test]
    fn restricted_key_rejected_for_ordinary_author() {
        let result = validate(&stock_draft(), AuthorStanding::Ordinary, AuthoringPolicy::default());
        assert_eq!(
            result,
            Err(ValidationError::UnassignablePermission(FillCentralRegister))
        );
    }

    #[test]
    fn superuser_may_grant_restricted_key() {
        let validated =
            validate(&stock_draft(), AuthorStanding::Superuser, AuthoringPolicy::default()).unwrap();
        assert!(validated.grants.contains(&FillCentralRegister));
        assert!(validated.grants.contains(&IssueStock));
        assert!(validated.stripped.is_empty());
    }

    #[test]
    fn root_location_head_may_grant_restricted_key() {
        let result = validate(
            &stock_draft(),
            AuthorStanding::RootLocationHead,
            AuthoringPolicy::default(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn rules_fire_in_order() {
        let mut draft = CustomRoleDraft::new("   ", LocationId::new());
        draft.location = None;
        let policy = AuthoringPolicy::default();
        assert_eq!(
            validate(&draft, AuthorStanding::Superuser, policy),
            Err(ValidationError::EmptyName)
        );

        draft.name = "Clerk".to_string();
        assert_eq!(
            validate(&draft, AuthorStanding::Superuser, policy),
            Err(ValidationError::MissingLocation)
        );

        draft.location = Some(LocationId::new());
        assert_eq!(
            validate(&draft, AuthorStanding::Superuser, policy),
            Err(ValidationError::NoPermissions)
        );
    }

    #[test]
    fn empty_grants_fail_regardless_of_name_and_location() {
        let draft = CustomRoleDraft::new("Clerk", LocationId::new()).requiring(Role::Auditor);
        assert_eq!(
            validate(&draft, AuthorStanding::Superuser, AuthoringPolicy::default()),
            Err(ValidationError::NoPermissions)
        );
    }

    #[test]
    fn strip_policy_drops_restricted_keys() {
        let policy = AuthoringPolicy::default().with_unassignable(UnassignablePolicy::Strip);
        let validated = validate(&stock_draft(), AuthorStanding::Ordinary, policy).unwrap();
        assert_eq!(validated.grants, BTreeSet::from([IssueStock]));
        assert_eq!(validated.stripped, BTreeSet::from([FillCentralRegister]));
    }

    #[test]
    fn strip_policy_that_empties_grants_fails() {
        let policy = AuthoringPolicy::default().with_unassignable(UnassignablePolicy::Strip);
        let draft = CustomRoleDraft::new("Register Clerk", LocationId::new())
            .requiring(Role::StockIncharge)
            .with_grants([FillCentralRegister]);
        assert_eq!(
            validate(&draft, AuthorStanding::Ordinary, policy),
            Err(ValidationError::NoPermissions)
        );
    }

    #[test]
    fn any_role_is_exempt_by_default() {
        let draft = CustomRoleDraft::new("Floater", LocationId::new())
            .with_grants([FillCentralRegister, ManageRoles]);
        assert!(validate(&draft, AuthorStanding::Ordinary, AuthoringPolicy::default()).is_ok());
    }

    #[test]
    fn any_role_union_policy_restricts() {
        let policy = AuthoringPolicy::default()
            .with_any_role(crate::constraints::AnyRolePolicy::RestrictedUnion);
        let draft = CustomRoleDraft::new("Floater", LocationId::new()).with_grants([IssueStock]);
        assert_eq!(
            validate(&draft, AuthorStanding::Ordinary, policy),
            Err(ValidationError::UnassignablePermission(IssueStock))
        );
        assert!(validate(&draft, AuthorStanding::Superuser, policy).is_ok());
    }

    #[test]
    fn name_and_description_are_normalized() {
        let draft = CustomRoleDraft::new("  Night Shift  ", LocationId::new())
            .with_description("   ")
            .with_grants([ViewReports]);
        let validated = validate(&draft, AuthorStanding::Ordinary, AuthoringPolicy::default()).unwrap();
        assert_eq!(validated.name, "Night Shift");
        assert_eq!(validated.description, None);
    }

    fn created_role(author: AuthorStanding) -> CustomRole {
        let id = CustomRoleId::new();
        let mut role = CustomRole::empty(id);
        let cmd = CustomRoleCommand::Create(CreateCustomRole {
            id,
            draft: stock_draft(),
            author,
            policy: AuthoringPolicy::default(),
            occurred_at: now(),
        });
        for event in role.handle(&cmd).unwrap() {
            role.apply(&event);
        }
        role
    }

    #[test]
    fn create_applies_definition() {
        let role = created_role(AuthorStanding::Superuser);
        assert!(role.created);
        assert_eq!(role.version, 1);
        assert_eq!(role.name, "Senior Storekeeper");
        assert_eq!(role.requires_base_role, Some(Role::StockIncharge));
        assert!(role.as_grant().is_active);
    }

    #[test]
    fn create_twice_is_rejected() {
        let role = created_role(AuthorStanding::Superuser);
        let cmd = CustomRoleCommand::Create(CreateCustomRole {
            id: role.id,
            draft: stock_draft(),
            author: AuthorStanding::Superuser,
            policy: AuthoringPolicy::default(),
            occurred_at: now(),
        });
        assert!(matches!(
            role.handle(&cmd),
            Err(CustomRoleError::Domain(DomainError::InvariantViolation(_)))
        ));
    }

    #[test]
    fn replace_swaps_everything() {
        let mut role = created_role(AuthorStanding::Superuser);
        let location = LocationId::new();
        let draft = CustomRoleDraft::new("Reports Only", location)
            .with_description("read-only reporting")
            .with_grants([ViewReports])
            .inactive();
        let cmd = CustomRoleCommand::Replace(ReplaceCustomRole {
            id: role.id,
            draft,
            author: AuthorStanding::Ordinary,
            policy: AuthoringPolicy::default(),
            occurred_at: now(),
        });
        for event in role.handle(&cmd).unwrap() {
            role.apply(&event);
        }

        assert_eq!(role.name, "Reports Only");
        assert_eq!(role.description.as_deref(), Some("read-only reporting"));
        assert_eq!(role.location, Some(location));
        assert_eq!(role.requires_base_role, None);
        assert!(!role.is_active);
        assert_eq!(role.grants, BTreeSet::from([ViewReports]));
        assert_eq!(role.version, 2);
    }

    #[test]
    fn ordinary_author_cannot_resave_restricted_grants() {
        let role = created_role(AuthorStanding::Superuser);
        let cmd = CustomRoleCommand::Replace(ReplaceCustomRole {
            id: role.id,
            draft: stock_draft(),
            author: AuthorStanding::Ordinary,
            policy: AuthoringPolicy::default(),
            occurred_at: now(),
        });
        assert_eq!(
            role.handle(&cmd),
            Err(CustomRoleError::Validation(
                ValidationError::UnassignablePermission(FillCentralRegister)
            ))
        );
    }

    #[test]
    fn deleted_role_rejects_commands_and_never_applies() {
        let mut role = created_role(AuthorStanding::Superuser);
        let delete = CustomRoleCommand::Delete(DeleteCustomRole {
            id: role.id,
            occurred_at: now(),
        });
        for event in role.handle(&delete).unwrap() {
            role.apply(&event);
        }

        assert!(!role.as_grant().is_active);
        assert!(role.handle(&delete).is_err());
    }

    #[test]
    fn commands_on_missing_role_are_not_found() {
        let role = CustomRole::empty(CustomRoleId::new());
        let delete = CustomRoleCommand::Delete(DeleteCustomRole {
            id: role.id,
            occurred_at: now(),
        });
        assert_eq!(
            role.handle(&delete),
            Err(CustomRoleError::Domain(DomainError::NotFound))
        );
    }

    #[test]
    fn event_types_are_stable() {
        let e = CustomRoleEvent::Deleted(CustomRoleDeleted {
            id: CustomRoleId::new(),
            occurred_at: now(),
        });
        assert_eq!(e.event_type(), "auth.custom_role.deleted");
        assert_eq!(e.version(), 1);
    }

    fn arb_draft() -> impl Strategy<Value = CustomRoleDraft> {
        (
            "[ a-zA-Z]{0,12}",
            any::<bool>(),
            prop::option::of(prop::sample::select(Role::ALL.to_vec())),
            prop::collection::btree_set(prop::sample::select(PermissionKey::ALL.to_vec()), 0..6),
        )
            .prop_map(|(name, has_location, role, grants)| CustomRoleDraft {
                name,
                description: None,
                location: has_location.then(LocationId::new),
                requires_base_role: role,
                is_active: true,
                permission_grants: grants,
            })
    }

    fn arb_standing() -> impl Strategy<Value = AuthorStanding> {
        prop::sample::select(vec![
            AuthorStanding::Superuser,
            AuthorStanding::RootLocationHead,
            AuthorStanding::Ordinary,
        ])
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: validation is a pure function of draft and standing.
        #[test]
        fn validation_is_idempotent(draft in arb_draft(), author in arb_standing()) {
            let policy = AuthoringPolicy::default();
            prop_assert_eq!(validate(&draft, author, policy), validate(&draft, author, policy));
        }

        /// Property: whatever an ordinary author may save, a superuser may save too.
        #[test]
        fn superuser_accepts_superset(draft in arb_draft()) {
            let policy = AuthoringPolicy::default();
            if validate(&draft, AuthorStanding::Ordinary, policy).is_ok() {
                prop_assert!(validate(&draft, AuthorStanding::Superuser, policy).is_ok());
            }
        }
    }
}
