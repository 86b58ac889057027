//! Consul-compatible service registry client.
//!
//! # Responsibilities
//! - Query `GET /v1/health/service/<name>?passing=true`
//! - Turn registry entries into backend locations
//!
//! # Design Decisions
//! - The registry is a fallible remote dependency; every call is bounded
//!   by its own timeout, independent of the caller's deadline
//! - Entries without a service address fall back to the node address
//! - Entries are returned in registry order; selection happens elsewhere

use std::fmt;
use std::time::Duration;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::directory::BackendLocation;

/// Errors raised while talking to the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid registry address {0:?}")]
    Address(String),

    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registry answered with status {0}")]
    Status(reqwest::StatusCode),

    #[error("registry lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// A source of live instances for a service name.
#[async_trait]
pub trait ServiceRegistry: Send + Sync + fmt::Debug {
    /// Instances of `service` currently passing their health checks.
    async fn healthy_instances(&self, service: &str) -> Result<Vec<BackendLocation>, RegistryError>;
}

/// Parse a registry address. A bare `host:port` is treated as plain HTTP.
pub fn registry_url(address: &str) -> Result<Url, RegistryError> {
    let address = address.trim();
    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    };
    match Url::parse(&candidate) {
        Ok(url) if url.has_host() && !url.cannot_be_a_base() => Ok(url),
        _ => Err(RegistryError::Address(address.to_string())),
    }
}

/// Client for the Consul health API.
#[derive(Debug, Clone)]
pub struct ConsulRegistry {
    client: reqwest::Client,
    base: Url,
}

impl ConsulRegistry {
    pub fn new(address: &str, timeout: Duration) -> Result<Self, RegistryError> {
        let base = registry_url(address)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()?;
        Ok(Self { client, base })
    }

    fn service_url(&self, service: &str) -> Result<Url, RegistryError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RegistryError::Address(self.base.to_string()))?
            .pop_if_empty()
            .extend(["v1", "health", "service", service]);
        url.query_pairs_mut().append_pair("passing", "true");
        Ok(url)
    }
}

#[async_trait]
impl ServiceRegistry for ConsulRegistry {
    async fn healthy_instances(&self, service: &str) -> Result<Vec<BackendLocation>, RegistryError> {
        let url = self.service_url(service)?;
        tracing::debug!(service = %service, url = %url, "Querying registry");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status(status));
        }
        let entries: Vec<HealthEntry> = response.json().await?;
        Ok(entries
            .into_iter()
            .filter_map(|entry| entry.into_location(service))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthEntry {
    #[serde(default)]
    node: Option<NodeEntry>,
    service: ServiceEntry,
    #[serde(default)]
    checks: Vec<CheckEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NodeEntry {
    #[serde(default)]
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceEntry {
    #[serde(default)]
    address: String,
    port: u16,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CheckEntry {
    status: String,
}

impl HealthEntry {
    fn into_location(self, service: &str) -> Option<BackendLocation> {
        let host = if self.service.address.is_empty() {
            self.node.map(|n| n.address).unwrap_or_default()
        } else {
            self.service.address
        };
        if host.is_empty() || self.service.port == 0 {
            tracing::warn!(service = %service, "Registry entry without usable address, skipping");
            return None;
        }
        let mut location = BackendLocation::new(service, host, self.service.port);
        location.healthy = self.checks.iter().all(|c| c.status == "passing");
        Some(location)
    }
}
