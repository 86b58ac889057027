//! Upstream forwarding.
//!
//! # Responsibilities
//! - Rewrite the inbound request for a resolved backend location
//! - Send it with exactly one attempt under a bounded timeout
//! - Stream the backend response back without buffering, cutting the body
//!   off when the backend goes quiet for longer than the same timeout
//!
//! # Design Decisions
//! - Method, query, body and end-to-end headers pass through untouched
//! - Hop-by-hop headers are dropped in both directions
//! - The peer address is appended to `x-forwarded-for`
//! - Dropping the returned future aborts the upstream request, so a client
//!   disconnect cancels the backend call

use std::net::SocketAddr;
use std::time::Duration;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, Uri, Version},
    response::Response,
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::time;
use tower_http::timeout::TimeoutBody;

use crate::config::TimeoutConfig;
use crate::directory::BackendLocation;
use crate::routing::Route;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Transport-level failure talking to a backend.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("cannot build upstream uri for {target}: {source}")]
    InvalidUri {
        target: String,
        #[source]
        source: axum::http::Error,
    },

    #[error("upstream {target} failed: {source}")]
    Upstream {
        target: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("upstream {target} did not respond within {after:?}")]
    Timeout { target: String, after: Duration },
}

/// Sends requests to resolved backend locations.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(connect_timeout: Duration, timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client, timeout }
    }

    pub fn from_config(config: &TimeoutConfig) -> Self {
        Self::new(
            Duration::from_millis(config.connect_ms),
            Duration::from_secs(config.forward_secs),
        )
    }

    /// Forward `request` to `location`, rewriting its path for `route`.
    pub async fn forward(
        &self,
        location: &BackendLocation,
        route: &Route,
        request: Request<Body>,
    ) -> Result<Response, ForwardError> {
        let target = location.authority();
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let (mut parts, body) = request.into_parts();
        parts.uri = upstream_uri(&target, route, &parts.uri)
            .map_err(|source| ForwardError::InvalidUri { target: target.clone(), source })?;
        parts.version = Version::HTTP_11;
        strip_hop_by_hop(&mut parts.headers);
        if let Some(peer) = peer {
            append_forwarded_for(&mut parts.headers, peer);
        }

        tracing::debug!(backend = %location.name, target = %target, uri = %parts.uri, "Forwarding request");

        let outbound = Request::from_parts(parts, body);
        match time::timeout(self.timeout, self.client.request(outbound)).await {
            Ok(Ok(response)) => Ok(relay(response, self.timeout)),
            Ok(Err(source)) => Err(ForwardError::Upstream { target, source }),
            Err(_) => Err(ForwardError::Timeout { target, after: self.timeout }),
        }
    }
}

/// Client-facing response for an upstream one. The body stream errors out
/// after `idle` without a frame, so a stalled backend releases the connection.
fn relay(response: Response<Incoming>, idle: Duration) -> Response {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(TimeoutBody::new(idle, body)))
}

/// `http://<target><rewritten path and query>`.
fn upstream_uri(target: &str, route: &Route, inbound: &Uri) -> Result<Uri, axum::http::Error> {
    let path_and_query = route.upstream_path_and_query(inbound.path(), inbound.query());
    Uri::builder()
        .scheme("http")
        .authority(target)
        .path_and_query(path_and_query)
        .build()
}

/// Remove hop-by-hop headers, including any named by `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, peer: SocketAddr) {
    let ip = peer.ip().to_string();
    let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => format!("{existing}, {ip}"),
        _ => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
