//! Authorization explanations (audit trail).
//!
//! Answers "why was this allowed/denied?" with the same precedence the
//! evaluator uses, so an explanation never disagrees with a decision.

use serde::Serialize;

use crate::constraints::profile_for;
use crate::{AuthorizationFacts, PermissionKey};

/// Which rule decided the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantPath {
    Superuser,
    DirectFlag,
    LegacyCodename,
    UnknownKey,
    Missing,
}

/// Snapshot of the facts consulted for an explanation.
#[derive(Debug, Clone, Serialize)]
pub struct FactsSummary {
    pub is_superuser: bool,
    pub legacy_role: Option<String>,
    pub groups: Vec<String>,
    pub granted_flags: Vec<String>,
    pub legacy_codenames: Vec<String>,
}

impl FactsSummary {
    fn of(facts: &AuthorizationFacts) -> Self {
        Self {
            is_superuser: facts.is_superuser,
            legacy_role: facts.legacy_role.map(|r| r.as_str().to_string()),
            groups: facts.groups.iter().cloned().collect(),
            granted_flags: facts
                .permission_flags
                .iter()
                .filter(|(_, v)| **v)
                .map(|(k, _)| k.clone())
                .collect(),
            legacy_codenames: facts.legacy_codenames.iter().cloned().collect(),
        }
    }
}

/// Detailed explanation of one permission decision.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionExplanation {
    pub permission: String,
    pub granted: bool,
    pub path: GrantPath,
    pub reason: String,
    pub facts: FactsSummary,
    /// Empty when granted.
    pub suggestions: Vec<String>,
}

/// Explain the outcome of `has_permission(facts, key)`.
pub fn explain(facts: &AuthorizationFacts, key: &str) -> PermissionExplanation {
    let summary = FactsSummary::of(facts);

    let (granted, path, reason, suggestions) = if facts.is_superuser {
        (
            true,
            GrantPath::Superuser,
            "Principal is a superuser; all checks are bypassed".to_string(),
            Vec::new(),
        )
    } else {
        match key.parse::<PermissionKey>() {
            Err(_) => (
                false,
                GrantPath::UnknownKey,
                format!("Permission '{key}' is not in the catalog; unknown keys never grant"),
                vec!["Check the permission key for typos or stale stored data".to_string()],
            ),
            Ok(parsed) => explain_known(facts, parsed),
        }
    };

    PermissionExplanation {
        permission: key.to_string(),
        granted,
        path,
        reason,
        facts: summary,
        suggestions,
    }
}

fn explain_known(
    facts: &AuthorizationFacts,
    key: PermissionKey,
) -> (bool, GrantPath, String, Vec<String>) {
    if facts.permission_flags.get(key.as_str()).copied().unwrap_or(false) {
        return (
            true,
            GrantPath::DirectFlag,
            format!("Principal has a direct grant for '{key}'"),
            Vec::new(),
        );
    }

    if let Some(codename) = key.legacy_codename() {
        if facts.legacy_codenames.contains(codename.as_str()) {
            return (
                true,
                GrantPath::LegacyCodename,
                format!("Principal holds legacy codename '{codename}', which maps to '{key}'"),
                Vec::new(),
            );
        }
    }

    let mut suggestions = vec![format!(
        "Assign an active custom role that grants '{key}'"
    )];
    if let Some(codename) = key.legacy_codename() {
        suggestions.push(format!("Grant the legacy permission '{codename}'"));
    }
    if let Some(role) = facts.legacy_role {
        if profile_for(role).unassignable.contains(&key) {
            suggestions.push(format!(
                "'{key}' is restricted for {role}; only a superuser or root location head can delegate it"
            ));
        }
    }

    (
        false,
        GrantPath::Missing,
        format!("Principal does not have permission '{key}'"),
        suggestions,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Role, has_permission};

    #[test]
    fn explanation_agrees_with_evaluator() {
        let facts = AuthorizationFacts::default()
            .with_role(Role::StockIncharge)
            .with_flag("can_issue_stock", true)
            .with_codename("inventory.view_location")
            .with_flag("can_launch_rockets", true);

        for key in [
            "can_issue_stock",
            "can_view_locations",
            "can_fill_central_register",
            "can_launch_rockets",
        ] {
            assert_eq!(explain(&facts, key).granted, has_permission(&facts, key), "{key}");
        }
    }

    #[test]
    fn paths_are_reported() {
        let facts = AuthorizationFacts::default()
            .with_flag("can_issue_stock", true)
            .with_codename("inventory.view_location");

        assert_eq!(explain(&facts, "can_issue_stock").path, GrantPath::DirectFlag);
        assert_eq!(explain(&facts, "can_view_locations").path, GrantPath::LegacyCodename);
        assert_eq!(explain(&facts, "can_fly").path, GrantPath::UnknownKey);
        assert_eq!(explain(&facts, "can_view_reports").path, GrantPath::Missing);
        assert_eq!(
            explain(&AuthorizationFacts::superuser(), "can_fly").path,
            GrantPath::Superuser
        );
    }

    #[test]
    fn denial_mentions_restriction_for_role() {
        let facts = AuthorizationFacts::default().with_role(Role::StockIncharge);
        let explanation = explain(&facts, "can_fill_central_register");
        assert!(!explanation.granted);
        assert!(explanation.suggestions.iter().any(|s| s.contains("restricted")));
    }
}
