//! Permission Catalog: the closed set of permission keys, their categories and
//! their mapping onto legacy codenames.
//!
//! The catalog is generated at compile time from a single table, so an unknown
//! category or a key without a category cannot exist. Keys that show up in
//! stored data but are not listed here parse to [`UnknownKeyError`] and never
//! grant anything.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Permission key that is not part of the catalog.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown permission key '{0}'")]
pub struct UnknownKeyError(pub String);

/// Category name that is not part of the catalog.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown permission category '{0}'")]
pub struct UnknownCategoryError(pub String);

// ─────────────────────────────────────────────────────────────────────────────
// Categories
// ─────────────────────────────────────────────────────────────────────────────

/// Grouping used to present permissions to role authors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Inspections,
    Stock,
    Items,
    Locations,
    Users,
    Maintenance,
    InterStore,
    Reports,
}

impl Category {
    /// Display order.
    pub const ALL: [Category; 8] = [
        Category::Inspections,
        Category::Stock,
        Category::Items,
        Category::Locations,
        Category::Users,
        Category::Maintenance,
        Category::InterStore,
        Category::Reports,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Inspections => "inspections",
            Category::Stock => "stock",
            Category::Items => "items",
            Category::Locations => "locations",
            Category::Users => "users",
            Category::Maintenance => "maintenance",
            Category::InterStore => "inter_store",
            Category::Reports => "reports",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Category::Inspections => "Inspections",
            Category::Stock => "Stock",
            Category::Items => "Items",
            Category::Locations => "Locations",
            Category::Users => "Users",
            Category::Maintenance => "Maintenance",
            Category::InterStore => "Inter-Store Transfers",
            Category::Reports => "Reports",
        }
    }

    /// Icon identifier rendered next to the category heading.
    pub const fn icon(self) -> &'static str {
        match self {
            Category::Inspections => "clipboard-check",
            Category::Stock => "boxes",
            Category::Items => "tag",
            Category::Locations => "map-pin",
            Category::Users => "users",
            Category::Maintenance => "wrench",
            Category::InterStore => "truck",
            Category::Reports => "bar-chart",
        }
    }
}

impl core::fmt::Display for Category {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = UnknownCategoryError;

    /// Accepts the snake_case name or the display label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s || c.label() == s)
            .ok_or_else(|| UnknownCategoryError(s.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Legacy codenames
// ─────────────────────────────────────────────────────────────────────────────

/// Coarse permission identifier of the underlying `app.action_model` system.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LegacyCodename(&'static str);

impl LegacyCodename {
    pub fn as_str(&self) -> &'static str {
        self.0
    }

    /// The `app` half of `app.action_model`.
    pub fn app(&self) -> &'static str {
        self.0.split_once('.').map_or(self.0, |(app, _)| app)
    }
}

impl core::fmt::Display for LegacyCodename {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for LegacyCodename {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Permission keys
// ─────────────────────────────────────────────────────────────────────────────

macro_rules! permission_catalog {
    ($( $variant:ident => $key:literal, $category:ident, $legacy:expr; )+) => {
        /// Atomic capability identifier.
        ///
        /// Serialized as its snake_case key (e.g. `"can_issue_stock"`).
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum PermissionKey {
            $( $variant, )+
        }

        impl PermissionKey {
            /// Every key in the catalog, grouped by category.
            pub const ALL: &'static [PermissionKey] = &[ $( PermissionKey::$variant, )+ ];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $( PermissionKey::$variant => $key, )+
                }
            }

            pub const fn category(self) -> Category {
                match self {
                    $( PermissionKey::$variant => Category::$category, )+
                }
            }

            const fn legacy_raw(self) -> Option<&'static str> {
                match self {
                    $( PermissionKey::$variant => $legacy, )+
                }
            }
        }

        impl FromStr for PermissionKey {
            type Err = UnknownKeyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $key => Ok(PermissionKey::$variant), )+
                    _ => Err(UnknownKeyError(s.to_string())),
                }
            }
        }
    };
}

permission_catalog! {
    ViewInspections      => "can_view_inspections",       Inspections, Some("inventory.view_inspectioncertificate");
    CreateInspections    => "can_create_inspections",     Inspections, Some("inventory.add_inspectioncertificate");
    ApproveInspections   => "can_approve_inspections",    Inspections, None;

    ViewStock            => "can_view_stock",             Stock,       Some("inventory.view_stockentry");
    ReceiveStock         => "can_receive_stock",          Stock,       Some("inventory.add_stockentry");
    IssueStock           => "can_issue_stock",            Stock,       Some("inventory.add_stockissue");
    AdjustStock          => "can_adjust_stock",           Stock,       Some("inventory.change_stockentry");
    FillCentralRegister  => "can_fill_central_register",  Stock,       None;

    ViewItems            => "can_view_items",             Items,       Some("inventory.view_item");
    AddItems             => "can_add_items",              Items,       Some("inventory.add_item");
    EditItems            => "can_edit_items",             Items,       Some("inventory.change_item");
    DeleteItems          => "can_delete_items",           Items,       Some("inventory.delete_item");

    ViewLocations        => "can_view_locations",         Locations,   Some("inventory.view_location");
    AddLocations         => "can_add_locations",          Locations,   Some("inventory.add_location");
    EditLocations        => "can_edit_locations",         Locations,   Some("inventory.change_location");
    ManageAllLocations   => "can_manage_all_locations",   Locations,   None;

    ViewUsers            => "can_view_users",             Users,       Some("accounts.view_user");
    AddUsers             => "can_add_users",              Users,       Some("accounts.add_user");
    EditUsers            => "can_edit_users",             Users,       Some("accounts.change_user");
    ManageRoles          => "can_manage_roles",           Users,       None;

    ViewMaintenance      => "can_view_maintenance",       Maintenance, Some("maintenance.view_maintenancerecord");
    RequestMaintenance   => "can_request_maintenance",    Maintenance, Some("maintenance.add_maintenancerecord");
    ApproveMaintenance   => "can_approve_maintenance",    Maintenance, None;

    ViewTransfers        => "can_view_transfers",         InterStore,  Some("inventory.view_storetransfer");
    RequestTransfers     => "can_request_transfers",      InterStore,  Some("inventory.add_storetransfer");
    ApproveTransfers     => "can_approve_transfers",      InterStore,  None;

    ViewReports          => "can_view_reports",           Reports,     None;
    ExportReports        => "can_export_reports",         Reports,     None;
    ViewAuditLog         => "can_view_audit_log",         Reports,     None;
}

impl PermissionKey {
    pub fn legacy_codename(self) -> Option<LegacyCodename> {
        self.legacy_raw().map(LegacyCodename)
    }
}

impl core::fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PermissionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PermissionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

/// Read-only lookup indices over the permission table.
///
/// Built once per process on first use; there is no way to register keys at
/// runtime.
#[derive(Debug)]
pub struct Catalog {
    by_codename: HashMap<&'static str, PermissionKey>,
    by_category: HashMap<Category, Vec<PermissionKey>>,
}

static CATALOG: OnceLock<Catalog> = OnceLock::new();

impl Catalog {
    pub fn global() -> &'static Catalog {
        CATALOG.get_or_init(Catalog::build)
    }

    fn build() -> Self {
        let mut by_codename = HashMap::new();
        let mut by_category: HashMap<Category, Vec<PermissionKey>> = HashMap::new();

        for &key in PermissionKey::ALL {
            if let Some(codename) = key.legacy_raw() {
                by_codename.insert(codename, key);
            }
            by_category.entry(key.category()).or_default().push(key);
        }

        Self {
            by_codename,
            by_category,
        }
    }

    pub fn all_keys(&self) -> &'static [PermissionKey] {
        PermissionKey::ALL
    }

    pub fn lookup(&self, key: &str) -> Result<PermissionKey, UnknownKeyError> {
        key.parse()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_ok()
    }

    pub fn category_of(&self, key: &str) -> Result<Category, UnknownKeyError> {
        self.lookup(key).map(PermissionKey::category)
    }

    /// `None` both for keys without a legacy counterpart and for unknown keys.
    pub fn legacy_codename_of(&self, key: &str) -> Option<LegacyCodename> {
        self.lookup(key).ok().and_then(PermissionKey::legacy_codename)
    }

    /// Reverse of [`PermissionKey::legacy_codename`].
    pub fn key_for_codename(&self, codename: &str) -> Option<PermissionKey> {
        self.by_codename.get(codename).copied()
    }

    pub fn keys_in(&self, category: Category) -> &[PermissionKey] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_parses_back_from_its_string() {
        for &key in PermissionKey::ALL {
            assert_eq!(key.as_str().parse::<PermissionKey>(), Ok(key));
        }
    }

    #[test]
    fn unknown_key_is_rejected() {
        let catalog = Catalog::global();
        assert_eq!(
            catalog.category_of("can_launch_rockets"),
            Err(UnknownKeyError("can_launch_rockets".to_string()))
        );
        assert!(!catalog.contains("can_launch_rockets"));
        assert_eq!(catalog.legacy_codename_of("can_launch_rockets"), None);
    }

    #[test]
    fn categories_partition_the_catalog() {
        let catalog = Catalog::global();
        let total: usize = Category::ALL.iter().map(|c| catalog.keys_in(*c).len()).sum();
        assert_eq!(total, PermissionKey::ALL.len());
        for category in Category::ALL {
            assert!(!catalog.keys_in(category).is_empty(), "{category} has no keys");
        }
    }

    #[test]
    fn legacy_codenames_are_unique_and_reversible() {
        let catalog = Catalog::global();
        let mapped: Vec<_> = PermissionKey::ALL
            .iter()
            .filter_map(|k| k.legacy_codename().map(|c| (*k, c)))
            .collect();
        assert_eq!(mapped.len(), catalog.by_codename.len());
        for (key, codename) in mapped {
            assert_eq!(catalog.key_for_codename(codename.as_str()), Some(key));
        }
    }

    #[test]
    fn view_locations_maps_to_inventory_codename() {
        let codename = Catalog::global()
            .legacy_codename_of("can_view_locations")
            .unwrap();
        assert_eq!(codename.as_str(), "inventory.view_location");
        assert_eq!(codename.app(), "inventory");
    }

    #[test]
    fn category_parses_from_name_or_label() {
        assert_eq!("inter_store".parse::<Category>(), Ok(Category::InterStore));
        assert_eq!("Inter-Store Transfers".parse::<Category>(), Ok(Category::InterStore));
        assert!("Finance".parse::<Category>().is_err());
    }

    #[test]
    fn permission_key_serde_uses_snake_case_key() {
        let json = serde_json::to_string(&PermissionKey::IssueStock).unwrap();
        assert_eq!(json, "\"can_issue_stock\"");
        let back: PermissionKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PermissionKey::IssueStock);
        assert!(serde_json::from_str::<PermissionKey>("\"can_fly\"").is_err());
    }
}
