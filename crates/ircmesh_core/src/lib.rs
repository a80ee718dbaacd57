//! Core extension and lifecycle logic for ircmesh.
//! This crate owns every rule about attached data and entity teardown.

pub mod component;
pub mod config;
pub mod db;
pub mod extension;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod modules;
pub mod repo;
pub mod service;

pub use component::{Component, ComponentId, ComponentRef};
pub use config::{ConfigError, CoreConfig};
pub use extension::{
    BoolExtItem, ExtensionError, ExtensionItem, ExtensionKind, ExtensionManager, Extensible,
    ListExtItem, SimpleExtItem, ValueCodec,
};
pub use lifecycle::{CullList, CullResult, CullStats, Cullable, RefCounted, Shared};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::{Channel, Connection, Entity, EntityId};
pub use repo::{RepoError, RepoResult, SnapshotRepository, SqliteSnapshotRepository};
pub use service::{ServerError, ServerResult, ServerState};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
