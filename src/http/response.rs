//! Gateway-generated responses.
//!
//! # Responsibilities
//! - Map gateway failures to client-facing status codes
//! - Keep internal error text out of client responses
//! - Build the liveness payload
//!
//! # Design Decisions
//! - Bodies are small JSON objects: `{"error": "..."}`
//! - 429 responses carry `retry-after` in whole seconds, at least 1

use std::time::Duration;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::directory::ResolveError;
use crate::http::forwarder::ForwardError;

/// Every way the gateway can end a request without relaying a backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no route matches {path}")]
    RouteNotFound { path: String },

    #[error("rate limit exceeded for key {key}")]
    RateLimited { key: String, retry_after: Duration },

    #[error(transparent)]
    Resolution(#[from] ResolveError),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error("gateway is shutting down")]
    ShuttingDown,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Resolution(_)
            | GatewayError::Forward(_)
            | GatewayError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn client_message(&self) -> &'static str {
        match self {
            GatewayError::RouteNotFound { .. } => "Not found",
            GatewayError::RateLimited { .. } => "Too many requests",
            GatewayError::Resolution(_) | GatewayError::Forward(_) => "Service unavailable",
            GatewayError::ShuttingDown => "Shutting down",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(json!({ "error": self.client_message() }))).into_response();
        if let GatewayError::RateLimited { retry_after, .. } = &self {
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }
        response
    }
}

/// `200 {"status":"ok"}`.
pub fn health_response() -> Response {
    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}
