//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → AdmissionGate closes (new requests get 503)
//!             → background tasks exit
//!             → server drains in-flight connections
//! ```
//!
//! # Design Decisions
//! - One broadcast channel fans the shutdown out to every task
//! - Admission stops before draining, so no new work starts

pub mod shutdown;
pub mod signals;

pub use shutdown::{AdmissionGate, Shutdown};
