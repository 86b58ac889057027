//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing backends)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Detect conflicting routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{DiscoveryMode, GatewayConfig};
use crate::routing::router::normalize_prefix;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("bind address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("health path {0:?} must start with '/'")]
    HealthPath(String),

    #[error("route prefix {0:?} must start with '/'")]
    RoutePrefix(String),

    #[error("route prefix {0:?} is configured more than once")]
    DuplicatePrefix(String),

    #[error("route prefix {0:?} collides with the health path")]
    ShadowsHealth(String),

    #[error("route {prefix:?} references unknown backend {backend:?}")]
    UnknownBackend { prefix: String, backend: String },

    #[error("backend {name:?}: {reason}")]
    Backend { name: String, reason: &'static str },

    #[error("rate limit capacity must be greater than zero")]
    ZeroCapacity,

    #[error("rate limit window must be greater than zero")]
    ZeroWindow,

    #[error("timeout {0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("registry address {0:?} is not a valid URL")]
    RegistryAddress(String),
}

/// Validate a parsed configuration, collecting every problem.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if !config.health_path.starts_with('/') {
        errors.push(ValidationError::HealthPath(config.health_path.clone()));
    }

    let mut seen = HashSet::new();
    for route in &config.routes {
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::RoutePrefix(route.path_prefix.clone()));
            continue;
        }
        let prefix = normalize_prefix(&route.path_prefix);
        if !seen.insert(prefix.clone()) {
            errors.push(ValidationError::DuplicatePrefix(prefix.clone()));
        }
        if prefix == config.health_path {
            errors.push(ValidationError::ShadowsHealth(prefix));
        }
    }

    for backend in &config.backends {
        if backend.host.trim().is_empty() {
            errors.push(ValidationError::Backend {
                name: backend.name.clone(),
                reason: "host is empty",
            });
        }
        if backend.port == 0 {
            errors.push(ValidationError::Backend {
                name: backend.name.clone(),
                reason: "port must be non-zero",
            });
        }
    }

    match config.discovery.mode {
        DiscoveryMode::Static => {
            let known: HashSet<&str> = config.backends.iter().map(|b| b.name.as_str()).collect();
            for route in &config.routes {
                if !known.contains(route.backend.as_str()) {
                    errors.push(ValidationError::UnknownBackend {
                        prefix: route.path_prefix.clone(),
                        backend: route.backend.clone(),
                    });
                }
            }
        }
        DiscoveryMode::Registry => {
            if crate::directory::registry::registry_url(&config.discovery.registry_address).is_err() {
                errors.push(ValidationError::RegistryAddress(
                    config.discovery.registry_address.clone(),
                ));
            }
            if config.discovery.lookup_timeout_ms == 0 {
                errors.push(ValidationError::ZeroTimeout("discovery.lookup_timeout_ms"));
            }
        }
    }

    if config.rate_limit.enabled {
        if config.rate_limit.capacity == 0 {
            errors.push(ValidationError::ZeroCapacity);
        }
        if config.rate_limit.window_ms == 0 {
            errors.push(ValidationError::ZeroWindow);
        }
    }

    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.connect_ms"));
    }
    if config.timeouts.forward_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.forward_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.request_secs"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{BackendConfig, RouteConfig};

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.routes.push(RouteConfig::new("/service-a/", "service-a"));
        config.routes.push(RouteConfig::new("/health", "service-b"));
        config.routes.push(RouteConfig::new("/orders", "orders"));
        config.backends.push(BackendConfig::new("broken", "", 0));
        config.rate_limit.capacity = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicatePrefix("/service-a".into())));
        assert!(errors.contains(&ValidationError::ShadowsHealth("/health".into())));
        assert!(errors.contains(&ValidationError::UnknownBackend {
            prefix: "/orders".into(),
            backend: "orders".into(),
        }));
        assert!(errors.contains(&ValidationError::ZeroCapacity));
        assert_eq!(
            errors.iter().filter(|e| matches!(e, ValidationError::Backend { .. })).count(),
            2
        );
    }

    #[test]
    fn registry_mode_does_not_require_static_backends() {
        let mut config = GatewayConfig::default();
        config.backends.clear();
        config.discovery.mode = DiscoveryMode::Registry;
        config.discovery.registry_address = "consul:8500".into();
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn disabled_limiter_skips_limit_checks() {
        let mut config = GatewayConfig::default();
        config.rate_limit.enabled = false;
        config.rate_limit.window_ms = 0;
        assert_eq!(validate_config(&config), Ok(()));
    }
}
