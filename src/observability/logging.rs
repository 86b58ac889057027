//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Emit one access record per request
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the configured level when set

use std::sync::Arc;
use std::time::Instant;
use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::http::middleware::{Interceptor, Next};
use crate::observability::metrics::MetricsSink;
use crate::routing::RouteTable;

/// Install the global tracing subscriber.
pub fn init_logging(level: &str) {
    let fallback = format!("edge_gateway={level},tower_http={level}");
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Logs and measures every request that passes through the pipeline.
pub struct AccessLog {
    routes: Arc<RouteTable>,
    health_path: String,
    sink: Arc<dyn MetricsSink>,
}

impl AccessLog {
    pub fn new(routes: Arc<RouteTable>, health_path: impl Into<String>, sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            routes,
            health_path: health_path.into(),
            sink,
        }
    }

    /// Low-cardinality label for the request path.
    fn route_label(&self, path: &str) -> String {
        if path == self.health_path {
            return "health".to_string();
        }
        match self.routes.match_path(path) {
            Some(route) => route.prefix().to_string(),
            None => "unmatched".to_string(),
        }
    }
}

#[async_trait]
impl Interceptor for AccessLog {
    async fn handle(&self, request: Request<Body>, next: Next<'_>) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let response = next.run(request).await;

        let latency = start.elapsed();
        let status = response.status().as_u16();
        tracing::info!(
            method = %method,
            path = %path,
            status,
            latency_ms = latency.as_secs_f64() * 1000.0,
            "request"
        );
        self.sink
            .record_request(method.as_str(), &self.route_label(&path), status, latency);
        response
    }
}
