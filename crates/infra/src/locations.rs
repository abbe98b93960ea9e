//! Location directory: valid locations, root test, and who heads what.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use storekeep_core::{LocationId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    /// `None` for root locations (e.g. the central store).
    pub parent: Option<LocationId>,
    pub head: Option<UserId>,
}

impl Location {
    pub fn root(id: LocationId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent: None,
            head: None,
        }
    }

    pub fn child_of(id: LocationId, parent: LocationId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent: Some(parent),
            head: None,
        }
    }

    pub fn headed_by(mut self, user: UserId) -> Self {
        self.head = Some(user);
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

pub trait LocationDirectory: Send + Sync {
    fn contains(&self, location: LocationId) -> bool;
    fn is_root(&self, location: LocationId) -> bool;
    fn headed_by(&self, user: UserId) -> Vec<LocationId>;
}

impl<D> LocationDirectory for Arc<D>
where
    D: LocationDirectory + ?Sized,
{
    fn contains(&self, location: LocationId) -> bool {
        (**self).contains(location)
    }

    fn is_root(&self, location: LocationId) -> bool {
        (**self).is_root(location)
    }

    fn headed_by(&self, user: UserId) -> Vec<LocationId> {
        (**self).headed_by(user)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLocationDirectory {
    inner: RwLock<HashMap<LocationId, Location>>,
}

impl InMemoryLocationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, location: Location) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(location.id, location);
        }
    }
}

impl LocationDirectory for InMemoryLocationDirectory {
    fn contains(&self, location: LocationId) -> bool {
        self.inner
            .read()
            .map(|m| m.contains_key(&location))
            .unwrap_or(false)
    }

    fn is_root(&self, location: LocationId) -> bool {
        self.inner
            .read()
            .ok()
            .and_then(|m| m.get(&location).map(Location::is_root))
            .unwrap_or(false)
    }

    fn headed_by(&self, user: UserId) -> Vec<LocationId> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };
        let mut ids: Vec<LocationId> = map
            .values()
            .filter(|l| l.head == Some(user))
            .map(|l| l.id)
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_and_heads() {
        let dir = InMemoryLocationDirectory::new();
        let head = UserId::new();
        let central = LocationId::new();
        let branch = LocationId::new();
        dir.upsert(Location::root(central, "Central Store").headed_by(head));
        dir.upsert(Location::child_of(branch, central, "Lab Store"));

        assert!(dir.contains(branch));
        assert!(dir.is_root(central));
        assert!(!dir.is_root(branch));
        assert!(!dir.is_root(LocationId::new()));
        assert_eq!(dir.headed_by(head), vec![central]);
    }
}
