//! Edge gateway library.
//!
//! Single entry point for a set of backend services: path-prefix routing,
//! backend resolution through a static table or a service registry,
//! fixed-window admission control and streaming request forwarding.

pub mod config;
pub mod directory;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
