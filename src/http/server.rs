//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Assemble the request pipeline from configuration
//! - Create the Axum router and wire up tower layers (tracing, timeout, request ID)
//! - Run background tasks: directory refresh, configuration reload
//! - Serve until shutdown, then stop admitting and drain

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::directory::{BackendDirectory, Directory, RegistryError};
use crate::http::forwarder::Forwarder;
use crate::http::gateway::Gateway;
use crate::http::middleware::Pipeline;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::AdmissionGate;
use crate::observability::logging::AccessLog;
use crate::observability::metrics::MetricsSink;
use crate::routing::RouteTable;
use crate::security::rate_limit::{FixedWindowLimiter, RateLimit};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cannot build backend directory: {0}")]
    Directory(#[from] RegistryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

/// Build the interceptor chain for `config` in front of a [`Gateway`].
///
/// Order, outermost first: access log, admission gate, rate limit.
/// Rejections from the inner stages are therefore still logged.
pub fn build_pipeline(
    config: &GatewayConfig,
    directory: Arc<dyn BackendDirectory>,
    sink: Arc<dyn MetricsSink>,
    gate: AdmissionGate,
) -> Pipeline {
    let routes = Arc::new(RouteTable::from_config(&config.routes));
    let gateway = Gateway::new(
        routes.clone(),
        directory,
        Forwarder::from_config(&config.timeouts),
        config.health_path.clone(),
        sink.clone(),
    );

    let mut pipeline = Pipeline::new(Arc::new(gateway))
        .with(Arc::new(AccessLog::new(routes.clone(), config.health_path.clone(), sink.clone())))
        .with(Arc::new(gate));

    if config.rate_limit.enabled {
        let limiter = Arc::new(FixedWindowLimiter::from_config(&config.rate_limit));
        pipeline = pipeline.with(Arc::new(RateLimit::new(
            limiter,
            config.rate_limit.key,
            routes,
            sink,
        )));
    } else {
        tracing::warn!("Rate limiting disabled");
    }

    pipeline
}

/// The edge gateway's HTTP server.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    directory: Directory,
    gate: AdmissionGate,
}

impl GatewayServer {
    /// Create a server whose directory is chosen by `config.discovery`.
    pub fn new(config: GatewayConfig, sink: Arc<dyn MetricsSink>) -> Result<Self, ServerError> {
        let directory = Directory::from_config(&config)?;
        Ok(Self::with_directory(config, directory, sink))
    }

    /// Create a server around an existing directory.
    pub fn with_directory(config: GatewayConfig, directory: Directory, sink: Arc<dyn MetricsSink>) -> Self {
        let gate = AdmissionGate::new();
        let pipeline = build_pipeline(&config, directory.resolver(), sink, gate.clone());
        let state = AppState {
            pipeline: Arc::new(pipeline),
        };
        let router = Self::build_router(&config, state);

        tracing::info!(
            routes = config.routes.len(),
            discovery = ?config.discovery.mode,
            rate_limit = config.rate_limit.capacity,
            window_ms = config.rate_limit.window_ms,
            "Gateway assembled"
        );

        Self {
            router,
            config,
            directory,
            gate,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .fallback(gateway_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Router with state applied, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if let Directory::Registry(registry) = &self.directory {
            let interval = self.config.discovery.refresh_interval_secs;
            if interval > 0 {
                let names = RouteTable::from_config(&self.config.routes).backends();
                tokio::spawn(registry.clone().run_refresher(
                    names,
                    Duration::from_secs(interval),
                    shutdown.resubscribe(),
                ));
            }
        }

        let directory = self.directory.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(config) => {
                            directory.apply(&config);
                            tracing::info!(backends = config.backends.len(), "Backend table updated");
                        }
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        let gate = self.gate.clone();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                gate.close();
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Single handler: every request goes through the pipeline.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.pipeline.execute(request).await
}
