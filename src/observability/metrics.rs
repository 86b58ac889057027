//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define the gateway's metrics sink interface
//! - Record through a Prometheus recorder owned by the sink
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, route, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rate_limited_total` (counter): rejected admissions by key kind
//! - `gateway_resolution_failures_total` (counter): by backend
//! - `gateway_forward_failures_total` (counter): by backend
//!
//! # Design Decisions
//! - The recorder is local to the sink, never installed process-wide
//! - Sinks are injected into the gateway as `Arc<dyn MetricsSink>`

use std::sync::Arc;
use std::time::Duration;
use axum::{extract::State, routing::get, Router};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Destination for per-request measurements.
pub trait MetricsSink: Send + Sync {
    fn record_request(&self, method: &str, route: &str, status: u16, latency: Duration);
    fn record_rate_limited(&self, key_kind: &str);
    fn record_resolution_failure(&self, backend: &str);
    fn record_forward_failure(&self, backend: &str);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn record_request(&self, _: &str, _: &str, _: u16, _: Duration) {}
    fn record_rate_limited(&self, _: &str) {}
    fn record_resolution_failure(&self, _: &str) {}
    fn record_forward_failure(&self, _: &str) {}
}

/// Sink backed by a private Prometheus recorder.
pub struct PrometheusSink {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl PrometheusSink {
    pub fn new() -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets(LATENCY_BUCKETS)?
            .build_recorder();
        let handle = recorder.handle();
        Ok(Self { recorder, handle })
    }

    /// Render the Prometheus text exposition.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl MetricsSink for PrometheusSink {
    fn record_request(&self, method: &str, route: &str, status: u16, latency: Duration) {
        metrics::with_local_recorder(&self.recorder, || {
            let labels = [
                ("method", method.to_string()),
                ("route", route.to_string()),
                ("status", status.to_string()),
            ];
            counter!("gateway_requests_total", &labels).increment(1);
            histogram!("gateway_request_duration_seconds", &labels).record(latency.as_secs_f64());
        });
    }

    fn record_rate_limited(&self, key_kind: &str) {
        metrics::with_local_recorder(&self.recorder, || {
            counter!("gateway_rate_limited_total", "key" => key_kind.to_string()).increment(1);
        });
    }

    fn record_resolution_failure(&self, backend: &str) {
        metrics::with_local_recorder(&self.recorder, || {
            counter!("gateway_resolution_failures_total", "backend" => backend.to_string()).increment(1);
        });
    }

    fn record_forward_failure(&self, backend: &str) {
        metrics::with_local_recorder(&self.recorder, || {
            counter!("gateway_forward_failures_total", "backend" => backend.to_string()).increment(1);
        });
    }
}

/// Serve `GET /metrics` until shutdown.
pub async fn serve_metrics(
    listener: TcpListener,
    sink: Arc<PrometheusSink>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Metrics endpoint listening");
    let app = Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(sink);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}

async fn render_metrics(State(sink): State<Arc<PrometheusSink>>) -> String {
    sink.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_recorded_metrics() {
        let sink = PrometheusSink::new().unwrap();
        sink.record_request("GET", "/service-a", 200, Duration::from_millis(12));
        sink.record_rate_limited("global");
        sink.record_resolution_failure("service-c");

        let text = sink.render();
        assert!(text.contains("gateway_requests_total"));
        assert!(text.contains("route=\"/service-a\""));
        assert!(text.contains("gateway_request_duration_seconds_bucket"));
        assert!(text.contains("gateway_rate_limited_total{key=\"global\"} 1"));
        assert!(text.contains("backend=\"service-c\""));
    }

    #[test]
    fn sinks_do_not_share_state() {
        let first = PrometheusSink::new().unwrap();
        let second = PrometheusSink::new().unwrap();
        first.record_rate_limited("global");
        assert!(!second.render().contains("gateway_rate_limited_total"));
    }
}
