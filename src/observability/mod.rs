//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every request:
//!     → logging.rs (AccessLog: one structured event per request)
//!     → metrics.rs (MetricsSink: counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging with tracing fields for machine parsing
//! - Request ID flows through logs and to backends
//! - Metrics sink is injected, not a process-wide registry

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, AccessLog};
pub use metrics::{MetricsSink, NoopSink, PrometheusSink};
