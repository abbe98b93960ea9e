use serde::{Deserialize, Serialize};

use storekeep_core::LocationId;

use crate::{AuthorizationFacts, evaluate};

/// Privilege level of whoever is authoring a custom role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorStanding {
    Superuser,
    /// Location head of at least one root location.
    RootLocationHead,
    Ordinary,
}

impl AuthorStanding {
    /// Elevated authors may delegate restricted permissions.
    pub fn is_elevated(self) -> bool {
        matches!(self, AuthorStanding::Superuser | AuthorStanding::RootLocationHead)
    }

    /// Derive the standing from the author's facts and the locations they head.
    ///
    /// `is_root` is answered by the location directory.
    pub fn resolve<F>(facts: &AuthorizationFacts, head_of: &[LocationId], is_root: F) -> Self
    where
        F: Fn(LocationId) -> bool,
    {
        if facts.is_superuser {
            return AuthorStanding::Superuser;
        }
        if evaluate::is_location_head(facts) && head_of.iter().any(|l| is_root(*l)) {
            return AuthorStanding::RootLocationHead;
        }
        AuthorStanding::Ordinary
    }
}
