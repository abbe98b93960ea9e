use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use storekeep_auth::CustomRole;
use storekeep_core::{CustomRoleId, ExpectedVersion, LocationId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("custom role {0} not found")]
    NotFound(CustomRoleId),

    #[error("version conflict on custom role {id} (expected: {expected:?}, actual: {actual:?})")]
    Conflict {
        id: CustomRoleId,
        expected: ExpectedVersion,
        actual: Option<u64>,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Query filter; `None` fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CustomRoleFilter {
    pub location: Option<LocationId>,
    pub active: Option<bool>,
}

impl CustomRoleFilter {
    pub fn at(location: LocationId) -> Self {
        Self {
            location: Some(location),
            active: None,
        }
    }

    pub fn active_only(mut self) -> Self {
        self.active = Some(true);
        self
    }

    pub fn matches(&self, role: &CustomRole) -> bool {
        self.location.is_none_or(|l| role.location == Some(l))
            && self.active.is_none_or(|a| role.is_active == a)
    }
}

/// Persistence of custom-role records.
///
/// `save` and `delete` are all-or-nothing: the version check and the write
/// happen together, so a reader sees either the old record or the new one.
pub trait CustomRoleStore: Send + Sync {
    fn get(&self, id: CustomRoleId) -> Result<Option<CustomRole>, StoreError>;
    fn save(&self, role: CustomRole, expected: ExpectedVersion) -> Result<(), StoreError>;
    fn delete(&self, id: CustomRoleId, expected: ExpectedVersion) -> Result<(), StoreError>;
    fn list(&self, filter: &CustomRoleFilter) -> Result<Vec<CustomRole>, StoreError>;
}

impl<S> CustomRoleStore for Arc<S>
where
    S: CustomRoleStore + ?Sized,
{
    fn get(&self, id: CustomRoleId) -> Result<Option<CustomRole>, StoreError> {
        (**self).get(id)
    }

    fn save(&self, role: CustomRole, expected: ExpectedVersion) -> Result<(), StoreError> {
        (**self).save(role, expected)
    }

    fn delete(&self, id: CustomRoleId, expected: ExpectedVersion) -> Result<(), StoreError> {
        (**self).delete(id, expected)
    }

    fn list(&self, filter: &CustomRoleFilter) -> Result<Vec<CustomRole>, StoreError> {
        (**self).list(filter)
    }
}

/// In-memory store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCustomRoleStore {
    inner: RwLock<HashMap<CustomRoleId, CustomRole>>,
}

impl InMemoryCustomRoleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

fn check(
    id: CustomRoleId,
    expected: ExpectedVersion,
    current: Option<&CustomRole>,
) -> Result<(), StoreError> {
    let actual = current.map(|r| r.version);
    if expected.matches(actual) {
        Ok(())
    } else {
        Err(StoreError::Conflict {
            id,
            expected,
            actual,
        })
    }
}

impl CustomRoleStore for InMemoryCustomRoleStore {
    fn get(&self, id: CustomRoleId) -> Result<Option<CustomRole>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&id).cloned())
    }

    fn save(&self, role: CustomRole, expected: ExpectedVersion) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        check(role.id, expected, map.get(&role.id))?;
        map.insert(role.id, role);
        Ok(())
    }

    fn delete(&self, id: CustomRoleId, expected: ExpectedVersion) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        if !map.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        check(id, expected, map.get(&id))?;
        map.remove(&id);
        Ok(())
    }

    fn list(&self, filter: &CustomRoleFilter) -> Result<Vec<CustomRole>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        let mut roles: Vec<CustomRole> = map.values().filter(|r| filter.matches(r)).cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(name: &str, location: LocationId, active: bool, version: u64) -> CustomRole {
        let mut role = CustomRole::empty(CustomRoleId::new());
        role.name = name.to_string();
        role.location = Some(location);
        role.is_active = active;
        role.created = true;
        role.version = version;
        role
    }

    #[test]
    fn save_requires_expected_version() {
        let store = InMemoryCustomRoleStore::new();
        let location = LocationId::new();
        let mut r = role("Clerk", location, true, 1);

        store.save(r.clone(), ExpectedVersion::Absent).unwrap();
        assert!(matches!(
            store.save(r.clone(), ExpectedVersion::Absent),
            Err(StoreError::Conflict { actual: Some(1), .. })
        ));

        r.version = 2;
        r.name = "Senior Clerk".to_string();
        assert!(store.save(r.clone(), ExpectedVersion::Exact(5)).is_err());
        assert_eq!(store.get(r.id).unwrap().unwrap().name, "Clerk");

        store.save(r.clone(), ExpectedVersion::Exact(1)).unwrap();
        assert_eq!(store.get(r.id).unwrap().unwrap().name, "Senior Clerk");
    }

    #[test]
    fn list_filters_by_location_and_active() {
        let store = InMemoryCustomRoleStore::new();
        let a = LocationId::new();
        let b = LocationId::new();
        store.save(role("A1", a, true, 1), ExpectedVersion::Absent).unwrap();
        store.save(role("A2", a, false, 1), ExpectedVersion::Absent).unwrap();
        store.save(role("B1", b, true, 1), ExpectedVersion::Absent).unwrap();

        let names = |f: CustomRoleFilter| -> Vec<String> {
            store.list(&f).unwrap().into_iter().map(|r| r.name).collect()
        };
        assert_eq!(names(CustomRoleFilter::default()), ["A1", "A2", "B1"]);
        assert_eq!(names(CustomRoleFilter::at(a)), ["A1", "A2"]);
        assert_eq!(names(CustomRoleFilter::at(a).active_only()), ["A1"]);
    }

    #[test]
    fn delete_missing_is_not_found() {
        let store = InMemoryCustomRoleStore::new();
        let id = CustomRoleId::new();
        assert_eq!(store.delete(id, ExpectedVersion::Any), Err(StoreError::NotFound(id)));
    }
}
