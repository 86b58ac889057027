//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use edge_gateway::config::{BackendConfig, GatewayConfig};
use edge_gateway::observability::NoopSink;
use edge_gateway::{GatewayServer, Shutdown};

/// What a mock backend saw.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub target: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

async fn read_request<S>(socket: &mut BufReader<S>) -> Option<SeenRequest>
where
    S: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    socket.read_line(&mut line).await.ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut headers = HashMap::new();
    loop {
        let mut header = String::new();
        socket.read_line(&mut header).await.ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = vec![0; length];
    socket.read_exact(&mut body).await.ok()?;

    Some(SeenRequest {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        201 => "201 Created",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Start a programmable raw-TCP backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(SeenRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut socket = BufReader::new(socket);
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(request).await;
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_line(status),
                            body.len(),
                            body
                        );
                        let mut socket = socket.into_inner();
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Backend answering `200 "<name> <METHOD> <target>"`.
pub async fn start_echo_backend(name: &'static str) -> SocketAddr {
    start_programmable_backend(move |req| async move {
        (200, format!("{name} {} {}", req.method, req.target))
    })
    .await
}

/// Backend that records every request it receives.
pub async fn start_recording_backend(status: u16) -> (SocketAddr, Arc<Mutex<Vec<SeenRequest>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let addr = start_programmable_backend(move |req| {
        let log = log.clone();
        async move {
            let body = req.body.clone();
            log.lock().unwrap().push(req);
            (status, body)
        }
    })
    .await;
    (addr, seen)
}

/// Backend that sends its headers and part of the body, then goes silent.
pub async fn start_stalling_backend(declared_len: usize, partial: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut socket = BufReader::new(socket);
                if read_request(&mut socket).await.is_none() {
                    return;
                }
                let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {declared_len}\r\n\r\n{partial}");
                let mut socket = socket.into_inner();
                let _ = socket.write_all(head.as_bytes()).await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });

    addr
}

/// A local port with nothing listening on it.
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Config routing the two default prefixes to the given backends.
pub fn config_for(service_a: SocketAddr, service_b: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.observability.metrics_enabled = false;
    config.backends = vec![
        BackendConfig::new("service-a", "127.0.0.1", service_a.port()),
        BackendConfig::new("service-b", "127.0.0.1", service_b.port()),
    ];
    config.timeouts.connect_ms = 500;
    config.timeouts.forward_secs = 5;
    config
}

/// A running gateway.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub client: reqwest::Client,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.expect("gateway unreachable")
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a gateway for `config` on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    start_gateway_with_reload(config).await.0
}

/// Like [`start_gateway`], also returning the configuration update channel.
pub async fn start_gateway_with_reload(
    config: GatewayConfig,
) -> (TestGateway, mpsc::UnboundedSender<GatewayConfig>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (updates_tx, config_updates) = mpsc::unbounded_channel();
    let server = GatewayServer::new(config, Arc::new(NoopSink)).unwrap();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    let client = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap();

    (TestGateway { addr, shutdown, client }, updates_tx)
}

/// Mock Consul-compatible registry.
#[derive(Clone, Default)]
pub struct MockRegistry {
    services: Arc<Mutex<HashMap<String, Vec<Value>>>>,
    queries: Arc<AtomicUsize>,
}

impl MockRegistry {
    /// Register a passing instance of `service`.
    pub fn add(&self, service: &str, addr: SocketAddr) {
        self.add_with_status(service, addr, "passing");
    }

    pub fn add_with_status(&self, service: &str, addr: SocketAddr, status: &str) {
        let entry = json!({
            "Node": { "Address": addr.ip().to_string() },
            "Service": { "Address": "", "Port": addr.port() },
            "Checks": [{ "Status": status }],
        });
        self.services
            .lock()
            .unwrap()
            .entry(service.to_string())
            .or_default()
            .push(entry);
    }

    pub fn clear(&self, service: &str) {
        self.services.lock().unwrap().remove(service);
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub async fn start(&self) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/v1/health/service/{name}", get(health_service))
            .with_state(self.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        addr
    }
}

async fn health_service(State(registry): State<MockRegistry>, Path(name): Path<String>) -> Json<Vec<Value>> {
    registry.queries.fetch_add(1, Ordering::SeqCst);
    let services = registry.services.lock().unwrap();
    Json(services.get(&name).cloned().unwrap_or_default())
}
