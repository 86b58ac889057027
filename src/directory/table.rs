//! Static backend table.
//!
//! # Responsibilities
//! - Hold configured backend locations grouped by name
//! - Resolve a name with a pure lookup
//! - Swap the whole table when the configuration is reloaded

use std::collections::HashMap;
use std::sync::Arc;
use arc_swap::ArcSwap;
use async_trait::async_trait;

use crate::config::BackendConfig;
use crate::directory::{select_first_healthy, BackendDirectory, BackendLocation, ResolveError};

type Table = HashMap<String, Vec<BackendLocation>>;

/// Backend locations fixed by configuration.
#[derive(Debug)]
pub struct StaticDirectory {
    table: ArcSwap<Table>,
}

impl StaticDirectory {
    pub fn new(configs: &[BackendConfig]) -> Self {
        Self {
            table: ArcSwap::from_pointee(build_table(configs)),
        }
    }

    /// Replace every location at once. Readers see the old or the new
    /// table, never a mix.
    pub fn replace(&self, configs: &[BackendConfig]) {
        let table = build_table(configs);
        tracing::info!(backends = table.len(), "Static backend table replaced");
        self.table.store(Arc::new(table));
    }

    pub fn lookup(&self, name: &str) -> Result<BackendLocation, ResolveError> {
        let table = self.table.load();
        match table.get(name) {
            Some(locations) => select_first_healthy(name, locations),
            None => Err(ResolveError::NotFound(name.to_string())),
        }
    }

    /// Names currently known, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.load().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl BackendDirectory for StaticDirectory {
    async fn resolve(&self, name: &str) -> Result<BackendLocation, ResolveError> {
        self.lookup(name)
    }
}

fn build_table(configs: &[BackendConfig]) -> Table {
    let mut table: Table = HashMap::new();
    for config in configs {
        table
            .entry(config.name.clone())
            .or_default()
            .push(BackendLocation::new(&config.name, &config.host, config.port));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> StaticDirectory {
        StaticDirectory::new(&[
            BackendConfig::new("service-a", "10.0.0.1", 8080),
            BackendConfig::new("service-a", "10.0.0.2", 8080),
            BackendConfig::new("service-b", "10.0.0.3", 9090),
        ])
    }

    #[test]
    fn resolves_first_configured_instance() {
        let dir = directory();
        for _ in 0..3 {
            assert_eq!(dir.lookup("service-a").unwrap().host, "10.0.0.1");
        }
        assert_eq!(dir.lookup("service-b").unwrap().port, 9090);
    }

    #[test]
    fn unknown_name_is_not_found() {
        let err = directory().lookup("service-c").unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(ref n) if n == "service-c"));
    }

    #[test]
    fn replace_swaps_everything() {
        let dir = directory();
        dir.replace(&[BackendConfig::new("service-c", "10.0.0.9", 80)]);
        assert!(dir.lookup("service-a").is_err());
        assert_eq!(dir.lookup("service-c").unwrap().host, "10.0.0.9");
        assert_eq!(dir.names(), vec!["service-c"]);
    }

    #[tokio::test]
    async fn resolves_through_trait() {
        let dir: Arc<dyn BackendDirectory> = Arc::new(directory());
        assert_eq!(dir.resolve("service-b").await.unwrap().authority(), "10.0.0.3:9090");
    }
}
