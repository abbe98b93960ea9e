//! `storekeep-auth` — permission resolution and custom-role constraints.
//!
//! Pure and synchronous: every input is already fetched, nothing here does IO,
//! so decisions are safe to evaluate from any number of request paths at once.

pub mod catalog;
pub mod constraints;
pub mod custom_role;
pub mod evaluate;
pub mod explain;
pub mod facts;
pub mod roles;
pub mod standing;

pub use catalog::{Catalog, Category, LegacyCodename, PermissionKey, UnknownKeyError};
pub use constraints::{
    AnyRolePolicy, AuthoringPolicy, GrantState, RolePermissionProfile, UnassignablePolicy,
    authoring_matrix, is_grantable, profile_for,
};
pub use custom_role::{
    CustomRole, CustomRoleCommand, CustomRoleDraft, CustomRoleError, CustomRoleEvent,
    ValidatedDraft, ValidationError, ValidationResult, validate,
};
pub use evaluate::{
    AuthzError, CommandAuthorization, authorize, authorize_any, authorize_command, has, has_all,
    has_any, has_group, has_permission, has_role, is_auditor, is_central_store_incharge,
    is_location_head, is_stock_incharge, is_system_admin,
};
pub use explain::{GrantPath, PermissionExplanation, explain};
pub use facts::{
    AuthorizationFacts, CustomRoleGrant, FactsUnavailableError, PermissionSnapshot, UserRecord,
    facts_or_deny, resolve_facts,
};
pub use roles::{CENTRAL_STORE_INCHARGE_GROUP, Role};
pub use standing::AuthorStanding;
