//! Backend directory subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → backend name identified
//!     → BackendDirectory::resolve(name)
//!         - table.rs   (static locations from configuration)
//!         - dynamic.rs (registry lookups via registry.rs, cached snapshots)
//!     → first healthy location, or a typed ResolveError
//! ```
//!
//! # Design Decisions
//! - Resolution is treated as fallible and possibly remote for every call
//! - Location sets are replaced wholesale, never edited in place
//! - Selection is first-healthy in snapshot order, so it is deterministic
//!   for a given snapshot

pub mod dynamic;
pub mod location;
pub mod registry;
pub mod table;

use std::fmt;
use std::sync::Arc;
use async_trait::async_trait;
use thiserror::Error;

use crate::config::{DiscoveryMode, GatewayConfig};

pub use dynamic::RegistryDirectory;
pub use location::BackendLocation;
pub use registry::{ConsulRegistry, RegistryError, ServiceRegistry};
pub use table::StaticDirectory;

/// Why a backend name could not be turned into a location.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("backend {0:?} is not known to the directory")]
    NotFound(String),

    #[error("backend {0:?} has no healthy instance")]
    NoHealthyInstance(String),

    #[error("registry lookup for {name:?} failed: {source}")]
    Registry {
        name: String,
        #[source]
        source: RegistryError,
    },
}

impl ResolveError {
    /// Backend name the failure concerns.
    pub fn backend(&self) -> &str {
        match self {
            ResolveError::NotFound(name) | ResolveError::NoHealthyInstance(name) => name,
            ResolveError::Registry { name, .. } => name,
        }
    }
}

/// Turns backend names into network locations.
#[async_trait]
pub trait BackendDirectory: Send + Sync + fmt::Debug {
    async fn resolve(&self, name: &str) -> Result<BackendLocation, ResolveError>;
}

/// First healthy location in order.
pub fn select_first_healthy(name: &str, locations: &[BackendLocation]) -> Result<BackendLocation, ResolveError> {
    locations
        .iter()
        .find(|l| l.healthy)
        .cloned()
        .ok_or_else(|| ResolveError::NoHealthyInstance(name.to_string()))
}

/// The directory variant selected by configuration.
#[derive(Debug, Clone)]
pub enum Directory {
    Static(Arc<StaticDirectory>),
    Registry(Arc<RegistryDirectory>),
}

impl Directory {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, RegistryError> {
        match config.discovery.mode {
            DiscoveryMode::Static => Ok(Directory::Static(Arc::new(StaticDirectory::new(&config.backends)))),
            DiscoveryMode::Registry => {
                let timeout = config.discovery.lookup_timeout();
                let registry = ConsulRegistry::new(&config.discovery.registry_address, timeout)?;
                Ok(Directory::Registry(Arc::new(RegistryDirectory::new(
                    Arc::new(registry),
                    timeout,
                    config.discovery.cache_ttl(),
                ))))
            }
        }
    }

    pub fn resolver(&self) -> Arc<dyn BackendDirectory> {
        match self {
            Directory::Static(d) => d.clone() as Arc<dyn BackendDirectory>,
            Directory::Registry(d) => d.clone() as Arc<dyn BackendDirectory>,
        }
    }

    /// Apply a reloaded configuration. Only static tables change.
    pub fn apply(&self, config: &GatewayConfig) {
        match self {
            Directory::Static(d) => d.replace(&config.backends),
            Directory::Registry(_) => {
                tracing::debug!("Registry directory ignores static backend changes");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    #[test]
    fn first_healthy_skips_unhealthy() {
        let mut a = BackendLocation::new("svc", "a", 1);
        a.healthy = false;
        let b = BackendLocation::new("svc", "b", 2);
        let c = BackendLocation::new("svc", "c", 3);
        assert_eq!(select_first_healthy("svc", &[a.clone(), b.clone(), c]).unwrap(), b);
        assert!(matches!(
            select_first_healthy("svc", &[a]),
            Err(ResolveError::NoHealthyInstance(_))
        ));
    }

    #[tokio::test]
    async fn static_config_reload_replaces_table() {
        let mut config = GatewayConfig::default();
        let directory = Directory::from_config(&config).unwrap();
        assert_eq!(directory.resolver().resolve("service-a").await.unwrap().host, "service-a");

        config.backends = vec![BackendConfig::new("service-a", "10.9.9.9", 8080)];
        directory.apply(&config);
        assert_eq!(directory.resolver().resolve("service-a").await.unwrap().host, "10.9.9.9");
        assert!(directory.resolver().resolve("service-b").await.is_err());
    }
}
