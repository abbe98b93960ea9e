use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Group whose members may fill the central stock register.
pub const CENTRAL_STORE_INCHARGE_GROUP: &str = "Central Store Incharge";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRoleError(pub String);

/// Legacy single-valued role carried on the user record.
///
/// Each role has an equivalent group name in the group-membership system; the
/// pair is fixed by [`Role::group_name`] / [`Role::from_group_name`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SystemAdmin,
    LocationHead,
    StockIncharge,
    Auditor,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::SystemAdmin,
        Role::LocationHead,
        Role::StockIncharge,
        Role::Auditor,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::SystemAdmin => "SYSTEM_ADMIN",
            Role::LocationHead => "LOCATION_HEAD",
            Role::StockIncharge => "STOCK_INCHARGE",
            Role::Auditor => "AUDITOR",
        }
    }

    pub const fn group_name(self) -> &'static str {
        match self {
            Role::SystemAdmin => "System Admin",
            Role::LocationHead => "Location Head",
            Role::StockIncharge => "Stock Incharge",
            Role::Auditor => "Auditor",
        }
    }

    pub fn from_group_name(group: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|r| r.group_name() == group)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownRoleError(s.to_string()))
    }
}
