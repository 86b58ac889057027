//! Request dispatch.
//!
//! # Pipeline
//! ```text
//! GET health_path              → 200 {"status":"ok"}
//! no route prefix matches      → 404
//! directory cannot resolve     → 503
//! forwarder fails              → 503
//! otherwise                    → backend response, verbatim
//! ```
//!
//! Admission control and access logging run as interceptors in front of
//! this endpoint (see [`crate::http::server::build_pipeline`]).

use std::sync::Arc;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    response::{IntoResponse, Response},
};

use crate::directory::BackendDirectory;
use crate::http::forwarder::Forwarder;
use crate::http::middleware::Endpoint;
use crate::http::request::RequestIdExt;
use crate::http::response::{health_response, GatewayError};
use crate::observability::metrics::MetricsSink;
use crate::routing::RouteTable;

/// Terminal endpoint: liveness, route match, resolution, forwarding.
pub struct Gateway {
    routes: Arc<RouteTable>,
    directory: Arc<dyn BackendDirectory>,
    forwarder: Forwarder,
    health_path: String,
    sink: Arc<dyn MetricsSink>,
}

impl Gateway {
    pub fn new(
        routes: Arc<RouteTable>,
        directory: Arc<dyn BackendDirectory>,
        forwarder: Forwarder,
        health_path: impl Into<String>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            routes,
            directory,
            forwarder,
            health_path: health_path.into(),
            sink,
        }
    }

    pub async fn dispatch(&self, request: Request<Body>) -> Result<Response, GatewayError> {
        let path = request.uri().path();
        if request.method() == Method::GET && path == self.health_path {
            return Ok(health_response());
        }

        let route = self.routes.match_path(path).ok_or_else(|| {
            tracing::debug!(path = %path, "No route matched");
            GatewayError::RouteNotFound { path: path.to_string() }
        })?;

        let request_id = request.request_id().to_string();

        let location = self.directory.resolve(&route.backend).await.map_err(|e| {
            tracing::warn!(request_id = %request_id, backend = %e.backend(), error = %e, "Backend resolution failed");
            self.sink.record_resolution_failure(&route.backend);
            e
        })?;

        let response = self
            .forwarder
            .forward(&location, route, request)
            .await
            .map_err(|e| {
                tracing::error!(
                    request_id = %request_id,
                    backend = %location.name,
                    target = %location.authority(),
                    error = %e,
                    "Upstream request failed"
                );
                self.sink.record_forward_failure(&location.name);
                e
            })?;

        Ok(response)
    }
}

#[async_trait]
impl Endpoint for Gateway {
    async fn call(&self, request: Request<Body>) -> Response {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }
}
