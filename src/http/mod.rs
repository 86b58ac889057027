//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tower layers, request ID)
//!     → middleware.rs (interceptor chain: access log, admission, rate limit)
//!     → gateway.rs (health check, route match, backend resolution)
//!     → forwarder.rs (rewrite and send upstream, stream response back)
//!     → response.rs (gateway-generated errors)
//!     → Send to client
//! ```

pub mod forwarder;
pub mod gateway;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use forwarder::{ForwardError, Forwarder};
pub use gateway::Gateway;
pub use middleware::{Endpoint, Interceptor, Next, Pipeline};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::GatewayError;
pub use server::{build_pipeline, GatewayServer, ServerError};
