//! Infrastructure layer: persistence adapters, external collaborators,
//! configuration and the custom-role lifecycle orchestration.

pub mod config;
pub mod facts_source;
pub mod locations;
pub mod manager;
pub mod store;


pub use config::{ConfigError, EngineConfig};
pub use facts_source::{Author, FactsResolver, FactsSource, InMemoryFactsSource, SessionProfile};
pub use locations::{InMemoryLocationDirectory, Location, LocationDirectory};
pub use manager::{Committed, CustomRoleManager, ManagerError};
pub use store::{
    CustomRoleFilter, CustomRoleStore, InMemoryCustomRoleStore, InMemoryRoleAssignments,
    RoleAssignments, StoreError,
};
