//! Role Constraint Engine.
//!
//! Each base role carries a fixed set of permissions it always holds (base,
//! shown locked-on to authors) and a fixed set that a custom role built on it
//! may only include when an elevated author grants it (unassignable).

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::{AuthorStanding, Category, Catalog, PermissionKey, Role};
use crate::catalog::PermissionKey::*;

/// Derived per-role constraint sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolePermissionProfile {
    pub role: Role,
    pub base: BTreeSet<PermissionKey>,
    pub unassignable: BTreeSet<PermissionKey>,
}

const LOCATION_HEAD_BASE: &[PermissionKey] = &[
    ViewInspections,
    ApproveInspections,
    ViewStock,
    ViewItems,
    ViewLocations,
    AddLocations,
    EditLocations,
    ViewUsers,
    AddUsers,
    EditUsers,
    ViewMaintenance,
    ApproveMaintenance,
    ViewTransfers,
    ApproveTransfers,
    ViewReports,
];

const LOCATION_HEAD_UNASSIGNABLE: &[PermissionKey] = &[
    FillCentralRegister,
    ManageAllLocations,
    ManageRoles,
    ViewAuditLog,
];

const STOCK_INCHARGE_BASE: &[PermissionKey] = &[
    ViewInspections,
    ViewStock,
    ReceiveStock,
    IssueStock,
    ViewItems,
    AddItems,
    ViewLocations,
    RequestMaintenance,
    ViewTransfers,
    RequestTransfers,
];

const STOCK_INCHARGE_UNASSIGNABLE: &[PermissionKey] = &[
    FillCentralRegister,
    DeleteItems,
    ManageAllLocations,
    AddUsers,
    EditUsers,
    ManageRoles,
    ApproveTransfers,
    ViewAuditLog,
];

const AUDITOR_BASE: &[PermissionKey] = &[
    ViewInspections,
    ViewStock,
    ViewItems,
    ViewLocations,
    ViewUsers,
    ViewMaintenance,
    ViewTransfers,
    ViewReports,
    ExportReports,
    ViewAuditLog,
];

const AUDITOR_UNASSIGNABLE: &[PermissionKey] = &[
    ApproveInspections,
    ReceiveStock,
    IssueStock,
    AdjustStock,
    FillCentralRegister,
    DeleteItems,
    ManageAllLocations,
    ManageRoles,
    ApproveTransfers,
];

static PROFILES: OnceLock<HashMap<Role, RolePermissionProfile>> = OnceLock::new();

fn profiles() -> &'static HashMap<Role, RolePermissionProfile> {
    PROFILES.get_or_init(|| {
        let table: [(Role, &[PermissionKey], &[PermissionKey]); 4] = [
            // system admins hold everything, so nothing is left to restrict
            (Role::SystemAdmin, PermissionKey::ALL, &[]),
            (Role::LocationHead, LOCATION_HEAD_BASE, LOCATION_HEAD_UNASSIGNABLE),
            (Role::StockIncharge, STOCK_INCHARGE_BASE, STOCK_INCHARGE_UNASSIGNABLE),
            (Role::Auditor, AUDITOR_BASE, AUDITOR_UNASSIGNABLE),
        ];

        table
            .into_iter()
            .map(|(role, base, unassignable)| {
                let profile = RolePermissionProfile {
                    role,
                    base: base.iter().copied().collect(),
                    unassignable: unassignable.iter().copied().collect(),
                };
                (role, profile)
            })
            .collect()
    })
}

pub fn profile_for(role: Role) -> &'static RolePermissionProfile {
    // every Role variant is in the table
    &profiles()[&role]
}

/// Whether `author` may switch `key` on for a custom role built on `role`.
///
/// Base permissions are never grantable: they are already on.
pub fn is_grantable(role: Role, key: PermissionKey, author: AuthorStanding) -> bool {
    let profile = profile_for(role);
    if profile.base.contains(&key) {
        return false;
    }
    if profile.unassignable.contains(&key) && !author.is_elevated() {
        return false;
    }
    true
}

/// What happens to a non-grantable key in a submitted grant set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignablePolicy {
    /// Fail validation with the first offending key.
    #[default]
    Reject,
    /// Drop offending keys before saving.
    Strip,
}

/// How custom roles without a base-role requirement are constrained.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnyRolePolicy {
    /// No base-role checks at all.
    #[default]
    Exempt,
    /// Restricted if any role restricts the key.
    RestrictedUnion,
    /// Restricted only if every role that restricts anything restricts the key.
    RestrictedIntersection,
}

/// Authoring rules for the two policy choices left open by the domain.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthoringPolicy {
    pub unassignable: UnassignablePolicy,
    pub any_role: AnyRolePolicy,
}

impl AuthoringPolicy {
    pub fn with_unassignable(mut self, policy: UnassignablePolicy) -> Self {
        self.unassignable = policy;
        self
    }

    pub fn with_any_role(mut self, policy: AnyRolePolicy) -> Self {
        self.any_role = policy;
        self
    }
}

/// Keys restricted for "any role" custom roles under `policy`.
pub fn any_role_restricted(policy: AnyRolePolicy) -> BTreeSet<PermissionKey> {
    let restricting = Role::ALL
        .into_iter()
        .map(|r| &profile_for(r).unassignable)
        .filter(|set| !set.is_empty());

    match policy {
        AnyRolePolicy::Exempt => BTreeSet::new(),
        AnyRolePolicy::RestrictedUnion => restricting.flatten().copied().collect(),
        AnyRolePolicy::RestrictedIntersection => restricting
            .cloned()
            .reduce(|acc, set| acc.intersection(&set).copied().collect())
            .unwrap_or_default(),
    }
}

/// Presentation state of one key in the authoring matrix.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantState {
    /// Base permission: shown on, cannot be unset.
    Locked,
    /// Not delegable by this author: shown disabled.
    Restricted,
    Available,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixEntry {
    pub key: PermissionKey,
    pub state: GrantState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySection {
    pub category: Category,
    pub label: &'static str,
    pub icon: &'static str,
    pub entries: Vec<MatrixEntry>,
}

/// State of `key` for a custom role on `base_role` authored by `author`.
pub fn grant_state(
    base_role: Option<Role>,
    key: PermissionKey,
    author: AuthorStanding,
    policy: AuthoringPolicy,
) -> GrantState {
    match base_role {
        Some(role) => {
            let profile = profile_for(role);
            if profile.base.contains(&key) {
                GrantState::Locked
            } else if is_grantable(role, key, author) {
                GrantState::Available
            } else {
                GrantState::Restricted
            }
        }
        None => {
            if !author.is_elevated() && any_role_restricted(policy.any_role).contains(&key) {
                GrantState::Restricted
            } else {
                GrantState::Available
            }
        }
    }
}

/// Every catalog key, grouped by category, with its authoring state.
pub fn authoring_matrix(
    base_role: Option<Role>,
    author: AuthorStanding,
    policy: AuthoringPolicy,
) -> Vec<CategorySection> {
    let catalog = Catalog::global();
    Category::ALL
        .into_iter()
        .map(|category| CategorySection {
            category,
            label: category.label(),
            icon: category.icon(),
            entries: catalog
                .keys_in(category)
                .iter()
                .map(|&key| MatrixEntry {
                    key,
                    state: grant_state(base_role, key, author, policy),
                })
                .collect(),
        })
        .collect()
}
