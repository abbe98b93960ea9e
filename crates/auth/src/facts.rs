//! Role Resolver: turns already-fetched user, session and custom-role data
//! into the point-in-time [`AuthorizationFacts`] consumed by the evaluator.
//!
//! Pure and synchronous. Fetching, caching and retries belong to the caller.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use storekeep_core::{CustomRoleId, UserId};

use crate::{PermissionKey, Role};

/// The session/profile source could not produce facts for a principal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("authorization facts unavailable: {0}")]
pub struct FactsUnavailableError(pub String);

/// User record fields relevant to authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: UserId,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub is_main_store_incharge: bool,
}

impl UserRecord {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            is_superuser: false,
            role: None,
            is_main_store_incharge: false,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn superuser(mut self) -> Self {
        self.is_superuser = true;
        self
    }
}

/// Permission snapshot supplied by the session/profile fetch.
///
/// Flag keys are kept as raw strings: stored data may mention keys the
/// catalog does not know, and those must survive resolution without ever
/// granting anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSnapshot {
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub permissions: HashMap<String, bool>,
    #[serde(default)]
    pub codenames: Vec<String>,
}

/// The part of a custom role the resolver reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRoleGrant {
    pub id: CustomRoleId,
    pub requires_base_role: Option<Role>,
    pub is_active: bool,
    pub grants: BTreeSet<PermissionKey>,
}

impl CustomRoleGrant {
    /// Whether this role contributes grants to a user holding `legacy_role`.
    pub fn applies_to(&self, legacy_role: Option<Role>) -> bool {
        self.is_active
            && match self.requires_base_role {
                None => true,
                Some(required) => legacy_role == Some(required),
            }
    }
}

/// Resolved authorization attributes of one user at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationFacts {
    pub is_superuser: bool,
    pub legacy_role: Option<Role>,
    pub groups: BTreeSet<String>,
    pub permission_flags: BTreeMap<String, bool>,
    pub legacy_codenames: BTreeSet<String>,
    pub is_main_store_incharge: bool,
}

impl AuthorizationFacts {
    /// Facts that grant nothing. Used whenever real facts are unavailable.
    pub fn deny_all() -> Self {
        Self::default()
    }

    pub fn superuser() -> Self {
        Self {
            is_superuser: true,
            ..Self::default()
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.legacy_role = Some(role);
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    pub fn with_flag(mut self, key: impl Into<String>, value: bool) -> Self {
        self.permission_flags.insert(key.into(), value);
        self
    }

    pub fn with_codename(mut self, codename: impl Into<String>) -> Self {
        self.legacy_codenames.insert(codename.into());
        self
    }

    pub fn with_main_store_incharge(mut self) -> Self {
        self.is_main_store_incharge = true;
        self
    }

    /// Merge a custom role's grants if it applies to this user's legacy role.
    ///
    /// Returns whether anything was merged. Grants only ever add `true` flags.
    pub fn merge_custom_role(&mut self, role: &CustomRoleGrant) -> bool {
        if !role.applies_to(self.legacy_role) {
            debug!(
                custom_role_id = %role.id,
                is_active = role.is_active,
                requires_base_role = ?role.requires_base_role,
                legacy_role = ?self.legacy_role,
                "custom role does not apply; grants skipped"
            );
            return false;
        }

        for key in &role.grants {
            self.permission_flags.insert(key.as_str().to_string(), true);
        }
        true
    }
}

/// Resolve the facts for `user`.
///
/// - superuser: the record flag OR the snapshot flag
/// - legacy role: straight from the record
/// - groups, codenames, direct flags: from the snapshot (empty when absent)
/// - custom roles: active ones whose base-role requirement matches are unioned in
pub fn resolve_facts(
    user: &UserRecord,
    snapshot: Option<&PermissionSnapshot>,
    custom_roles: &[CustomRoleGrant],
) -> AuthorizationFacts {
    let mut facts = AuthorizationFacts {
        is_superuser: user.is_superuser,
        legacy_role: user.role,
        is_main_store_incharge: user.is_main_store_incharge,
        ..AuthorizationFacts::default()
    };

    if let Some(snapshot) = snapshot {
        facts.is_superuser |= snapshot.is_superuser;
        facts.groups.extend(snapshot.groups.iter().cloned());
        facts.legacy_codenames.extend(snapshot.codenames.iter().cloned());
        facts
            .permission_flags
            .extend(snapshot.permissions.iter().map(|(k, v)| (k.clone(), *v)));
    }

    for role in custom_roles {
        facts.merge_custom_role(role);
    }

    facts
}

/// Fail-closed conversion of a facts fetch result.
pub fn facts_or_deny(result: Result<AuthorizationFacts, FactsUnavailableError>) -> AuthorizationFacts {
    match result {
        Ok(facts) => facts,
        Err(e) => {
            warn!(error = %e, "denying: authorization facts unavailable");
            AuthorizationFacts::deny_all()
        }
    }
}
