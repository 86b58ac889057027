//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Fixed liveness path answered by the gateway itself.
    pub health_path: String,

    /// Route definitions mapping path prefixes to backend names.
    pub routes: Vec<RouteConfig>,

    /// Static backend locations. Several entries may share a name.
    pub backends: Vec<BackendConfig>,

    /// How backend names are turned into locations.
    pub discovery: DiscoveryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            health_path: "/health".to_string(),
            routes: vec![
                RouteConfig::new("/service-a", "service-a"),
                RouteConfig::new("/service-b", "service-b"),
            ],
            backends: vec![
                BackendConfig::new("service-a", "service-a", 8080),
                BackendConfig::new("service-b", "service-b", 8080),
            ],
            discovery: DiscoveryConfig::default(),
            timeouts: TimeoutConfig::default(),
            rate_limit: RateLimitConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Route configuration mapping a path prefix to a backend name.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteConfig {
    /// Path prefix to match, e.g. "/service-a".
    pub path_prefix: String,

    /// Backend name to resolve for matching requests.
    pub backend: String,

    /// Remove the matched prefix before forwarding.
    #[serde(default = "default_strip_prefix")]
    pub strip_prefix: bool,
}

impl RouteConfig {
    pub fn new(path_prefix: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            backend: backend.into(),
            strip_prefix: true,
        }
    }
}

fn default_strip_prefix() -> bool {
    true
}

/// Static backend location.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Backend name referenced by routes.
    pub name: String,

    /// Host name or IP address.
    pub host: String,

    /// TCP port.
    pub port: u16,
}

impl BackendConfig {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }
}

/// Backend resolution mode.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
    /// Locations come from `backends`.
    #[default]
    Static,
    /// Locations come from a Consul-compatible registry.
    Registry,
}

/// Service discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub mode: DiscoveryMode,

    /// Registry HTTP address, e.g. "http://consul:8500".
    pub registry_address: String,

    /// Deadline for a single registry lookup, in milliseconds.
    pub lookup_timeout_ms: u64,

    /// How long a successful lookup is reused, in milliseconds (0 = never).
    pub cache_ttl_ms: u64,

    /// Background refresh period in seconds (0 = disabled).
    pub refresh_interval_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            mode: DiscoveryMode::Static,
            registry_address: "http://127.0.0.1:8500".to_string(),
            lookup_timeout_ms: 2_000,
            cache_ttl_ms: 0,
            refresh_interval_secs: 0,
        }
    }
}

impl DiscoveryConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Deadline for a backend to start responding, in seconds.
    pub forward_secs: u64,

    /// Overall request deadline enforced by the server, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 2_000,
            forward_secs: 30,
            request_secs: 60,
        }
    }
}

/// What a rate limit bucket is keyed on.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// One budget shared by every request, including health probes.
    #[default]
    Global,
    /// One budget per peer IP address.
    ClientIp,
    /// One budget per matched route; the health path is exempt.
    Route,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests admitted per window.
    pub capacity: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Bucket keying.
    pub key: KeyStrategy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 100,
            window_ms: 1_000,
            key: KeyStrategy::Global,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
