//! Shutdown coordination for the gateway.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use tokio::sync::broadcast;

use crate::http::middleware::{Interceptor, Next};
use crate::http::response::GatewayError;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared flag deciding whether new requests are admitted.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    open: Arc<AtomicBool>,
}

impl AdmissionGate {
    pub fn new() -> Self {
        Self {
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Stop admitting. Irreversible.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            tracing::info!("Admissions closed");
        }
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Interceptor for AdmissionGate {
    async fn handle(&self, request: Request<Body>, next: Next<'_>) -> Response {
        if self.is_open() {
            next.run(request).await
        } else {
            GatewayError::ShuttingDown.into_response()
        }
    }
}
