//! Custom-role persistence and the user ↔ custom-role assignment relation.

pub mod assignments;
pub mod custom_roles;

pub use assignments::{InMemoryRoleAssignments, RoleAssignments};
pub use custom_roles::{CustomRoleFilter, CustomRoleStore, InMemoryCustomRoleStore, StoreError};
