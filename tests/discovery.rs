//! Registry-backed resolution against a mock Consul-compatible registry.

use std::net::SocketAddr;
use reqwest::StatusCode;

use edge_gateway::config::{DiscoveryMode, GatewayConfig};

mod common;

fn registry_config(registry: SocketAddr, cache_ttl_ms: u64) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.observability.metrics_enabled = false;
    config.backends.clear();
    config.discovery.mode = DiscoveryMode::Registry;
    config.discovery.registry_address = format!("http://{registry}");
    config.discovery.lookup_timeout_ms = 1_000;
    config.discovery.cache_ttl_ms = cache_ttl_ms;
    config.timeouts.connect_ms = 500;
    config
}

#[tokio::test]
async fn resolves_backends_through_registry() {
    let backend = common::start_echo_backend("service-a").await;
    let registry = common::MockRegistry::default();
    registry.add("service-a", backend);
    let registry_addr = registry.start().await;

    let gateway = common::start_gateway(registry_config(registry_addr, 0)).await;

    let res = gateway.get("/service-a/items").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "service-a GET /items");
}

#[tokio::test]
async fn unregistered_service_is_unavailable() {
    let registry = common::MockRegistry::default();
    let registry_addr = registry.start().await;
    let gateway = common::start_gateway(registry_config(registry_addr, 0)).await;

    assert_eq!(gateway.get("/service-b/items").await.status(), StatusCode::SERVICE_UNAVAILABLE);
    // Routing still happens before resolution.
    assert_eq!(gateway.get("/nowhere").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unreachable_registry_is_unavailable() {
    let port = common::unused_port();
    let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    let gateway = common::start_gateway(registry_config(addr, 0)).await;

    assert_eq!(gateway.get("/service-a/items").await.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(gateway.get("/health").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn skips_instances_with_failing_checks() {
    let healthy = common::start_echo_backend("healthy").await;
    let sick = common::start_echo_backend("sick").await;
    let registry = common::MockRegistry::default();
    registry.add_with_status("service-a", sick, "critical");
    registry.add("service-a", healthy);
    let registry_addr = registry.start().await;

    let gateway = common::start_gateway(registry_config(registry_addr, 0)).await;

    let res = gateway.get("/service-a/ping").await;
    assert_eq!(res.text().await.unwrap(), "healthy GET /ping");
}

#[tokio::test]
async fn zero_ttl_queries_registry_per_request() {
    let backend = common::start_echo_backend("service-a").await;
    let registry = common::MockRegistry::default();
    registry.add("service-a", backend);
    let registry_addr = registry.start().await;
    let gateway = common::start_gateway(registry_config(registry_addr, 0)).await;

    for _ in 0..3 {
        assert_eq!(gateway.get("/service-a/x").await.status(), StatusCode::OK);
    }
    assert_eq!(registry.queries(), 3);
}

#[tokio::test]
async fn cached_lookups_survive_registry_changes_until_expiry() {
    let backend = common::start_echo_backend("service-a").await;
    let registry = common::MockRegistry::default();
    registry.add("service-a", backend);
    let registry_addr = registry.start().await;
    let gateway = common::start_gateway(registry_config(registry_addr, 60_000)).await;

    assert_eq!(gateway.get("/service-a/x").await.status(), StatusCode::OK);
    registry.clear("service-a");
    assert_eq!(gateway.get("/service-a/y").await.status(), StatusCode::OK);
    assert_eq!(registry.queries(), 1);
}
