//! Permission Evaluator: pure decisions over [`AuthorizationFacts`].
//!
//! - No IO
//! - No panics
//! - Same facts, same answer
//!
//! Unknown permission keys never grant (fail-closed); they are logged, not
//! raised.

use thiserror::Error;
use tracing::warn;

use crate::roles::CENTRAL_STORE_INCHARGE_GROUP;
use crate::{AuthorizationFacts, PermissionKey, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("forbidden: none of the required permissions {0:?} held")]
    ForbiddenAny(Vec<String>),

    /// An empty requirement list never authorizes.
    #[error("forbidden: empty permission requirement")]
    EmptyRequirement,
}

/// Command-side authorization contract (checked before a command runs).
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[PermissionKey];
}

/// Typed check for a catalog key.
pub fn has(facts: &AuthorizationFacts, key: PermissionKey) -> bool {
    if facts.is_superuser {
        return true;
    }

    if facts.permission_flags.get(key.as_str()).copied().unwrap_or(false) {
        return true;
    }

    key.legacy_codename()
        .is_some_and(|codename| facts.legacy_codenames.contains(codename.as_str()))
}

/// Does `facts` grant the permission named `key`?
///
/// Superuser short-circuits. Otherwise the key must be in the catalog and be
/// granted either by a direct flag or by its legacy codename.
pub fn has_permission(facts: &AuthorizationFacts, key: &str) -> bool {
    if facts.is_superuser {
        return true;
    }

    match key.parse::<PermissionKey>() {
        Ok(key) => has(facts, key),
        Err(e) => {
            warn!(error = %e, "permission check on unknown key denied");
            false
        }
    }
}

/// True iff at least one key is granted. An empty list is never satisfied
/// (superuser aside).
pub fn has_any<I>(facts: &AuthorizationFacts, keys: I) -> bool
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    if facts.is_superuser {
        return true;
    }
    keys.into_iter().any(|k| has_permission(facts, k.as_ref()))
}

/// True iff every key is granted and there is at least one key.
pub fn has_all<I>(facts: &AuthorizationFacts, keys: I) -> bool
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    if facts.is_superuser {
        return true;
    }

    let mut seen_any = false;
    for key in keys {
        if !has_permission(facts, key.as_ref()) {
            return false;
        }
        seen_any = true;
    }
    seen_any
}

pub fn has_group(facts: &AuthorizationFacts, group: &str) -> bool {
    facts.groups.contains(group)
}

/// Role check across the three sources: superuser, the legacy role field,
/// and the equivalent group.
///
/// A superuser holds every role, not only `SystemAdmin`.
pub fn has_role(facts: &AuthorizationFacts, role: Role) -> bool {
    if facts.is_superuser {
        return true;
    }
    if facts.legacy_role == Some(role) {
        return true;
    }
    has_group(facts, role.group_name())
}

pub fn is_system_admin(facts: &AuthorizationFacts) -> bool {
    has_role(facts, Role::SystemAdmin)
}

pub fn is_location_head(facts: &AuthorizationFacts) -> bool {
    has_role(facts, Role::LocationHead)
}

pub fn is_stock_incharge(facts: &AuthorizationFacts) -> bool {
    has_role(facts, Role::StockIncharge)
}

pub fn is_auditor(facts: &AuthorizationFacts) -> bool {
    has_role(facts, Role::Auditor)
}

/// Central store standing can be reached through any of four paths.
pub fn is_central_store_incharge(facts: &AuthorizationFacts) -> bool {
    facts.is_superuser
        || has_group(facts, CENTRAL_STORE_INCHARGE_GROUP)
        || has(facts, PermissionKey::FillCentralRegister)
        || facts.is_main_store_incharge
}

/// Guard form of [`has_permission`].
pub fn authorize(facts: &AuthorizationFacts, key: &str) -> Result<(), AuthzError> {
    if has_permission(facts, key) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(key.to_string()))
    }
}

/// Guard form of [`has_any`].
pub fn authorize_any(facts: &AuthorizationFacts, keys: &[&str]) -> Result<(), AuthzError> {
    if has_any(facts, keys) {
        return Ok(());
    }
    if keys.is_empty() {
        return Err(AuthzError::EmptyRequirement);
    }
    Err(AuthzError::ForbiddenAny(
        keys.iter().map(|k| k.to_string()).collect(),
    ))
}

/// Every permission a command declares must be held.
pub fn authorize_command<C: CommandAuthorization>(
    facts: &AuthorizationFacts,
    command: &C,
) -> Result<(), AuthzError> {
    let required = command.required_permissions();
    if required.is_empty() && !facts.is_superuser {
        return Err(AuthzError::EmptyRequirement);
    }
    for key in required {
        if !has(facts, *key) {
            return Err(AuthzError::Forbidden(key.as_str().to_string()));
        }
    }
    Ok(())
}
