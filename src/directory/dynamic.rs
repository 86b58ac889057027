//! Registry-backed directory.
//!
//! # Responsibilities
//! - Resolve backend names through a [`ServiceRegistry`]
//! - Cache the last successful answer per name as an immutable snapshot
//! - Optionally keep snapshots warm from a background task
//!
//! # Design Decisions
//! - Snapshots are swapped with `ArcSwap`; a refresh publishes a new map,
//!   so readers observe the fully old or fully new location set
//! - Every lookup runs under its own timeout
//! - Refresh errors keep the previous snapshot for the background task, but
//!   a request-path lookup that fails surfaces as a resolution failure

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time;

use crate::directory::registry::{RegistryError, ServiceRegistry};
use crate::directory::{select_first_healthy, BackendDirectory, BackendLocation, ResolveError};

/// Locations known for one backend name at one point in time.
#[derive(Debug)]
pub struct DirectorySnapshot {
    pub locations: Vec<BackendLocation>,
    pub fetched_at: Instant,
}

type Snapshots = HashMap<String, Arc<DirectorySnapshot>>;

/// Directory that asks a service registry where backends live.
#[derive(Debug)]
pub struct RegistryDirectory {
    registry: Arc<dyn ServiceRegistry>,
    snapshots: ArcSwap<Snapshots>,
    lookup_timeout: Duration,
    cache_ttl: Duration,
}

impl RegistryDirectory {
    pub fn new(registry: Arc<dyn ServiceRegistry>, lookup_timeout: Duration, cache_ttl: Duration) -> Self {
        Self {
            registry,
            snapshots: ArcSwap::from_pointee(HashMap::new()),
            lookup_timeout,
            cache_ttl,
        }
    }

    /// Current snapshot for `name`, if any.
    pub fn snapshot(&self, name: &str) -> Option<Arc<DirectorySnapshot>> {
        self.snapshots.load().get(name).cloned()
    }

    /// Query the registry for `name` and publish the result.
    pub async fn refresh(&self, name: &str) -> Result<Arc<DirectorySnapshot>, ResolveError> {
        let lookup = self.registry.healthy_instances(name);
        let locations = match time::timeout(self.lookup_timeout, lookup).await {
            Ok(Ok(locations)) => locations,
            Ok(Err(source)) => {
                return Err(ResolveError::Registry { name: name.to_string(), source });
            }
            Err(_) => {
                return Err(ResolveError::Registry {
                    name: name.to_string(),
                    source: RegistryError::Timeout(self.lookup_timeout),
                });
            }
        };

        if locations.is_empty() {
            self.snapshots.rcu(|current| {
                let mut next = (**current).clone();
                next.remove(name);
                next
            });
            return Err(ResolveError::NoHealthyInstance(name.to_string()));
        }

        let snapshot = Arc::new(DirectorySnapshot {
            locations,
            fetched_at: Instant::now(),
        });
        self.snapshots.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(name.to_string(), Arc::clone(&snapshot));
            next
        });
        tracing::debug!(backend = %name, instances = snapshot.locations.len(), "Directory snapshot refreshed");
        Ok(snapshot)
    }

    /// Refresh every name, logging failures.
    pub async fn refresh_all(&self, names: &[String]) {
        for name in names {
            if let Err(e) = self.refresh(name).await {
                tracing::warn!(backend = %name, error = %e, "Directory refresh failed");
            }
        }
    }

    /// Periodically refresh `names` until shutdown.
    pub async fn run_refresher(
        self: Arc<Self>,
        names: Vec<String>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(interval = ?interval, backends = names.len(), "Directory refresher starting");
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh_all(&names).await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Directory refresher received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl BackendDirectory for RegistryDirectory {
    async fn resolve(&self, name: &str) -> Result<BackendLocation, ResolveError> {
        if let Some(snapshot) = self.snapshot(name) {
            if snapshot.fetched_at.elapsed() < self.cache_ttl {
                return select_first_healthy(name, &snapshot.locations);
            }
        }
        let snapshot = self.refresh(name).await?;
        select_first_healthy(name, &snapshot.locations)
    }
}
