//! Configuration loading from disk and the environment.

use std::collections::BTreeSet;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use url::Url;

use crate::config::schema::{BackendConfig, DiscoveryMode, GatewayConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable {var}: {reason}")]
    Env { var: String, reason: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: GatewayConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load configuration from an optional file, falling back to defaults.
pub fn resolve_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let mut config = GatewayConfig::default();
            apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

/// Environment variable carrying the URL of a named backend,
/// e.g. `service-a` → `SERVICE_A_URL`.
pub fn backend_url_var(name: &str) -> String {
    let mut var: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    var.push_str("_URL");
    var
}

/// Apply deployment overrides on top of a parsed configuration.
///
/// Recognised variables: `PORT`, `RATE_LIMIT`, `RATE_LIMIT_WINDOW_MS`,
/// `CONSUL_ADDR`, `LOG_LEVEL` and `<BACKEND>_URL` for every backend name
/// mentioned by a route or a static backend entry.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        let port = parse_var::<u16>("PORT", &port)?;
        let mut addr: SocketAddr = config
            .listener
            .bind_address
            .parse()
            .map_err(|_| env_error("PORT", "listener.bind_address is not a socket address"))?;
        addr.set_port(port);
        config.listener.bind_address = addr.to_string();
    }

    if let Some(limit) = lookup("RATE_LIMIT") {
        config.rate_limit.capacity = parse_var("RATE_LIMIT", &limit)?;
    }
    if let Some(window) = lookup("RATE_LIMIT_WINDOW_MS") {
        config.rate_limit.window_ms = parse_var("RATE_LIMIT_WINDOW_MS", &window)?;
    }

    if let Some(addr) = lookup("CONSUL_ADDR") {
        config.discovery.registry_address = addr;
        config.discovery.mode = DiscoveryMode::Registry;
    }

    if let Some(level) = lookup("LOG_LEVEL") {
        config.observability.log_level = level;
    }

    let names: BTreeSet<String> = config
        .routes
        .iter()
        .map(|r| r.backend.clone())
        .chain(config.backends.iter().map(|b| b.name.clone()))
        .collect();

    for name in names {
        let var = backend_url_var(&name);
        if let Some(raw) = lookup(&var) {
            let backend = backend_from_url(&name, &var, &raw)?;
            config.backends.retain(|b| b.name != name);
            config.backends.push(backend);
        }
    }

    Ok(())
}

fn backend_from_url(name: &str, var: &str, raw: &str) -> Result<BackendConfig, ConfigError> {
    let url = Url::parse(raw).map_err(|e| env_error(var, e.to_string()))?;
    if url.scheme() != "http" {
        return Err(env_error(var, format!("unsupported scheme {:?}", url.scheme())));
    }
    let host = url
        .host_str()
        .ok_or_else(|| env_error(var, "missing host"))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| env_error(var, "missing port"))?;
    Ok(BackendConfig::new(name, host, port))
}

fn parse_var<T: std::str::FromStr>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| env_error(var, e.to_string()))
}

fn env_error(var: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Env {
        var: var.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::KeyStrategy;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn backend_var_names() {
        assert_eq!(backend_url_var("service-a"), "SERVICE_A_URL");
        assert_eq!(backend_url_var("billing.v2"), "BILLING_V2_URL");
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("PORT", "9100"),
                ("RATE_LIMIT", "10"),
                ("SERVICE_A_URL", "http://10.0.0.7:3000"),
                ("LOG_LEVEL", "debug"),
            ]),
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "0.0.0.0:9100");
        assert_eq!(config.rate_limit.capacity, 10);
        assert_eq!(config.observability.log_level, "debug");
        let a: Vec<_> = config.backends.iter().filter(|b| b.name == "service-a").collect();
        assert_eq!(a, vec![&BackendConfig::new("service-a", "10.0.0.7", 3000)]);
        assert!(config.backends.iter().any(|b| b.name == "service-b" && b.host == "service-b"));
    }

    #[test]
    fn url_without_port_uses_scheme_default() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, env(&[("SERVICE_B_URL", "http://b.internal")])).unwrap();
        assert!(config.backends.contains(&BackendConfig::new("service-b", "b.internal", 80)));
    }

    #[test]
    fn consul_addr_switches_to_registry_mode() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, env(&[("CONSUL_ADDR", "consul:8500")])).unwrap();
        assert_eq!(config.discovery.mode, DiscoveryMode::Registry);
        assert_eq!(config.discovery.registry_address, "consul:8500");
    }

    #[test]
    fn bad_values_are_reported_with_their_variable() {
        let mut config = GatewayConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("RATE_LIMIT", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref var, .. } if var == "RATE_LIMIT"));

        let err = apply_env_overrides(&mut config, env(&[("SERVICE_A_URL", "https://a:443")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref var, .. } if var == "SERVICE_A_URL"));
    }

    #[test]
    fn parses_toml() {
        let config: GatewayConfig = toml::from_str(
            r#"
            health_path = "/healthz"

            [[routes]]
            path_prefix = "/orders"
            backend = "orders"
            strip_prefix = false

            [[backends]]
            name = "orders"
            host = "127.0.0.1"
            port = 7000

            [rate_limit]
            capacity = 2
            key = "client_ip"
            "#,
        )
        .unwrap();

        assert_eq!(config.health_path, "/healthz");
        assert_eq!(config.routes.len(), 1);
        assert!(!config.routes[0].strip_prefix);
        assert_eq!(config.rate_limit.capacity, 2);
        assert_eq!(config.rate_limit.window_ms, 1_000);
        assert_eq!(config.rate_limit.key, KeyStrategy::ClientIp);
        assert_eq!(validate_config(&config), Ok(()));
    }
}
